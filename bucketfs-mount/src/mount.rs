use std::sync::Arc;

use bucketfs_common::backend::ObjectStore;
use bucketfs_common::keys::KeyResolver;

use crate::config::MountConfig;
use crate::error::MountError;
use crate::pool::ClientPool;
use crate::reader::{ObjectReader, ReadOptions};
use crate::record::Lookup;
use crate::secrets::SecretLookup;
use crate::writer::ObjectWriter;

/// Immutable per-mount state shared by the reader and the writer.
pub(crate) struct MountState {
    pub(crate) config: MountConfig,
    pub(crate) resolver: KeyResolver,
    pool: Arc<ClientPool>,
}

impl MountState {
    pub(crate) async fn client(
        &self,
        secrets: &dyn SecretLookup,
    ) -> Result<Arc<dyn ObjectStore>, MountError> {
        self.pool.acquire(&self.config, secrets).await
    }
}

/// A bucket exposed as a virtual filesystem under an optional prefix.
pub struct Mount {
    state: Arc<MountState>,
    reader: ObjectReader,
    writer: Option<ObjectWriter>,
}

impl Mount {
    /// Build a mount that shares the process-wide client pool.
    pub fn new(config: MountConfig) -> Self {
        Self::with_pool(config, ClientPool::global())
    }

    pub fn with_pool(config: MountConfig, pool: Arc<ClientPool>) -> Self {
        let resolver = KeyResolver::new(config.mount.as_deref(), config.path.as_deref());
        let write = config.write;
        let state = Arc::new(MountState {
            config,
            resolver,
            pool,
        });
        Self {
            reader: ObjectReader::new(state.clone()),
            writer: write.then(|| ObjectWriter::new(state.clone())),
            state,
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.state.config
    }

    /// Whether `name` falls under this mount's prefix.
    pub fn handles(&self, name: &str) -> bool {
        self.state.resolver.handles(name)
    }

    pub async fn read(
        &self,
        name: &str,
        options: &ReadOptions,
        secrets: &dyn SecretLookup,
    ) -> Result<Lookup, MountError> {
        self.reader.read(name, options, secrets).await
    }

    /// The write capability, present only when the mount was configured
    /// with `write = true`.
    pub fn writer(&self) -> Option<&ObjectWriter> {
        self.writer.as_ref()
    }
}
