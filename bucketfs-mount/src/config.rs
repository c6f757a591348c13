use serde::Deserialize;
use std::path::Path;

const DEFAULT_REGION: &str = "us-east-1";

/// Configuration of a single mounted bucket. Immutable once a mount is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountConfig {
    pub bucket: String,
    /// Virtual-name prefix this mount answers for.
    #[serde(default)]
    pub mount: Option<String>,
    /// Prefix inside the bucket that every key is placed under.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub write: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl MountConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            mount: None,
            path: None,
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            write: false,
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = Some(mount.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.is_empty() {
            anyhow::bail!("bucket must not be empty");
        }
        if let Some(ep) = &self.endpoint {
            if !ep.starts_with("http://") && !ep.starts_with("https://") {
                anyhow::bail!("endpoint must be an http(s) URL: {}", ep);
            }
        }
        let has_key = self.access_key_id.as_deref().is_some_and(|k| !k.is_empty());
        let has_secret = self
            .secret_access_key
            .as_deref()
            .is_some_and(|s| !s.is_empty());
        if has_key != has_secret {
            anyhow::bail!(
                "access_key_id and secret_access_key must be set together (bucket {})",
                self.bucket
            );
        }
        Ok(())
    }
}

/// Top-level configuration file: an ordered list of `[[mount]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketfsConfig {
    #[serde(rename = "mount", default)]
    pub mounts: Vec<MountConfig>,
}

impl BucketfsConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: BucketfsConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.mounts.is_empty() {
            anyhow::bail!("at least one [[mount]] must be configured");
        }
        for mount in &self.mounts {
            mount.validate()?;
        }
        Ok(())
    }
}
