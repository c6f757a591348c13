//! Credential lookup supplied by the host.
//!
//! When a mount is configured without explicit credentials, the client
//! pool asks the host for them under two fixed names.

use std::collections::HashMap;

use async_trait::async_trait;

pub const ACCESS_KEY_ID: &str = "S3_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY: &str = "S3_SECRET_ACCESS_KEY";

#[async_trait]
pub trait SecretLookup: Send + Sync {
    /// Look up a secret by name. `Ok(None)` means the host has no value.
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<String>>;
}

/// Secrets taken from process environment variables of the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

#[async_trait]
impl SecretLookup for EnvSecrets {
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(std::env::var(name).ok().filter(|v| !v.is_empty()))
    }
}

/// Secrets resolved up front and held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticSecrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl SecretLookup for StaticSecrets {
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_secrets() {
        let secrets = StaticSecrets::new()
            .with(ACCESS_KEY_ID, "AKID")
            .with(SECRET_ACCESS_KEY, "shh");
        assert_eq!(secrets.lookup(ACCESS_KEY_ID).await.unwrap().as_deref(), Some("AKID"));
        assert_eq!(secrets.lookup("OTHER").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_static_secrets_from_iter() {
        let secrets: StaticSecrets = [(SECRET_ACCESS_KEY, "shh")].into_iter().collect();
        assert_eq!(secrets.lookup(SECRET_ACCESS_KEY).await.unwrap().as_deref(), Some("shh"));
    }

    #[tokio::test]
    async fn test_env_secrets_missing() {
        let secrets = EnvSecrets;
        let value = secrets
            .lookup("BUCKETFS_TEST_SURELY_UNSET_VARIABLE")
            .await
            .unwrap();
        assert_eq!(value, None);
    }
}
