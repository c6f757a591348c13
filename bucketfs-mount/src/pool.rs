//! Process-wide registry of storage clients.
//!
//! One client is kept per (bucket, region, configured credentials,
//! endpoint). Mount prefix and base path are deliberately not part of the
//! key: mounts over the same bucket and credentials share a client.
//! Entries are created lazily and live until the process exits.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, info, warn};

use bucketfs_common::backend::ObjectStore;

use crate::config::MountConfig;
use crate::error::MountError;
use crate::s3::{S3Client, S3Config};
use crate::secrets::{self, SecretLookup};

/// Cache key. Holds the credentials as configured, not as looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    bucket: String,
    region: String,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    endpoint: Option<String>,
}

impl ClientKey {
    pub fn from_config(config: &MountConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

/// Everything needed to construct a client, with credentials resolved.
#[derive(Clone)]
pub struct ClientSpec {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub trait ClientFactory: Send + Sync {
    fn build(&self, spec: &ClientSpec) -> Result<Arc<dyn ObjectStore>, MountError>;
}

/// Builds path-style S3 clients.
pub struct S3Factory;

impl ClientFactory for S3Factory {
    fn build(&self, spec: &ClientSpec) -> Result<Arc<dyn ObjectStore>, MountError> {
        let client = S3Client::new(S3Config {
            bucket: spec.bucket.clone(),
            region: spec.region.clone(),
            endpoint: spec.endpoint.clone(),
            access_key_id: spec.access_key_id.clone(),
            secret_access_key: spec.secret_access_key.clone(),
        })
        .map_err(|e| MountError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Arc::new(client))
    }
}

pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<ClientKey, Arc<dyn ObjectStore>>>,
}

impl ClientPool {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The pool shared by every mount that is not given its own.
    pub fn global() -> Arc<ClientPool> {
        static GLOBAL: OnceLock<Arc<ClientPool>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ClientPool::new(Arc::new(S3Factory))))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached client for this configuration, building one on
    /// first use. Construction happens outside the lock; if two callers
    /// race on the same key both build a client and the later insert wins.
    pub async fn acquire(
        &self,
        config: &MountConfig,
        secrets: &dyn SecretLookup,
    ) -> Result<Arc<dyn ObjectStore>, MountError> {
        let key = ClientKey::from_config(config);
        let cached = self.clients.read().unwrap().get(&key).cloned();
        if let Some(client) = cached {
            return Ok(client);
        }

        let access_key_id =
            resolve_credential(config.access_key_id.as_deref(), secrets::ACCESS_KEY_ID, secrets)
                .await?;
        let secret_access_key = resolve_credential(
            config.secret_access_key.as_deref(),
            secrets::SECRET_ACCESS_KEY,
            secrets,
        )
        .await?;

        let access_key_id = access_key_id.ok_or(MountError::MissingCredential("accessKeyId"))?;
        let secret_access_key =
            secret_access_key.ok_or(MountError::MissingCredential("secretAccessKey"))?;

        let client = self.factory.build(&ClientSpec {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            access_key_id,
            secret_access_key,
        })?;

        self.clients.write().unwrap().insert(key, client.clone());
        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "Storage client created"
        );
        Ok(client)
    }
}

/// Use the configured value if present, otherwise ask the host.
async fn resolve_credential(
    configured: Option<&str>,
    name: &'static str,
    secrets: &dyn SecretLookup,
) -> Result<Option<String>, MountError> {
    if let Some(value) = configured.filter(|v| !v.is_empty()) {
        return Ok(Some(value.to_string()));
    }

    debug!(secret = name, "Credential not configured, asking host");
    let value = secrets.lookup(name).await.map_err(|e| {
        warn!(secret = name, error = %e, "Secret lookup failed");
        MountError::Secret {
            name,
            message: format!("{:#}", e),
        }
    })?;
    Ok(value.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecrets;
    use crate::testing::{CountingFactory, MemoryStore};

    fn pool() -> (ClientPool, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::new(Arc::new(MemoryStore::new())));
        (ClientPool::new(factory.clone()), factory)
    }

    fn env_secrets() -> StaticSecrets {
        StaticSecrets::new()
            .with(secrets::ACCESS_KEY_ID, "AKID")
            .with(secrets::SECRET_ACCESS_KEY, "shh")
    }

    #[tokio::test]
    async fn test_reuses_client_for_same_key() {
        let (pool, factory) = pool();
        let config = MountConfig::new("docs").with_credentials("AKID", "shh");

        pool.acquire(&config, &StaticSecrets::new()).await.unwrap();
        pool.acquire(&config, &StaticSecrets::new()).await.unwrap();

        assert_eq!(factory.builds(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_mount_and_path_do_not_split_cache() {
        let (pool, factory) = pool();
        let a = MountConfig::new("docs").with_mount("a").with_path("x");
        let b = MountConfig::new("docs").with_mount("b").with_path("y");

        pool.acquire(&a, &env_secrets()).await.unwrap();
        pool.acquire(&b, &env_secrets()).await.unwrap();

        assert_eq!(factory.builds(), 1);
    }

    #[tokio::test]
    async fn test_distinct_endpoints_get_distinct_clients() {
        let (pool, factory) = pool();
        let a = MountConfig::new("docs").with_credentials("AKID", "shh");
        let b = a.clone().with_endpoint("http://localhost:9000");

        pool.acquire(&a, &StaticSecrets::new()).await.unwrap();
        pool.acquire(&b, &StaticSecrets::new()).await.unwrap();

        assert_eq!(factory.builds(), 2);
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_credentials_from_secret_lookup() {
        let (pool, factory) = pool();
        let config = MountConfig::new("docs").with_region("eu-west-1");

        pool.acquire(&config, &env_secrets()).await.unwrap();

        let spec = factory.last_spec().unwrap();
        assert_eq!(spec.access_key_id, "AKID");
        assert_eq!(spec.secret_access_key, "shh");
        assert_eq!(spec.region, "eu-west-1");
    }

    #[tokio::test]
    async fn test_missing_access_key() {
        let (pool, factory) = pool();
        let secrets = StaticSecrets::new().with(secrets::SECRET_ACCESS_KEY, "shh");

        let Err(err) = pool.acquire(&MountConfig::new("docs"), &secrets).await else {
            panic!("expected a missing credential error");
        };
        assert!(matches!(err, MountError::MissingCredential("accessKeyId")));
        assert_eq!(factory.builds(), 0);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let (pool, _) = pool();
        let secrets = StaticSecrets::new().with(secrets::ACCESS_KEY_ID, "AKID");

        let Err(err) = pool.acquire(&MountConfig::new("docs"), &secrets).await else {
            panic!("expected a missing credential error");
        };
        assert!(matches!(err, MountError::MissingCredential("secretAccessKey")));
        assert_eq!(err.to_string(), "secretAccessKey is not set");
    }

    #[tokio::test]
    async fn test_concurrent_first_use_is_tolerated() {
        let (pool, factory) = pool();
        let pool = Arc::new(pool);
        let config = MountConfig::new("docs").with_credentials("AKID", "shh");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                pool.acquire(&config, &StaticSecrets::new()).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(factory.builds() >= 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_global_pool_is_shared() {
        let a = ClientPool::global();
        let b = ClientPool::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
