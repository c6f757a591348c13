use std::sync::Arc;

use bytes::Bytes;

use crate::config::BucketfsConfig;
use crate::error::MountError;
use crate::mount::Mount;
use crate::pool::ClientPool;
use crate::reader::ReadOptions;
use crate::record::{Lookup, WriteOutcome};
use crate::secrets::SecretLookup;

/// Ordered set of mounts. A name is routed to the first mount whose
/// prefix accepts it.
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    pub fn from_config(config: &BucketfsConfig, pool: Arc<ClientPool>) -> Self {
        Self::new(
            config
                .mounts
                .iter()
                .map(|m| Mount::with_pool(m.clone(), pool.clone()))
                .collect(),
        )
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub async fn read(
        &self,
        name: &str,
        options: &ReadOptions,
        secrets: &dyn SecretLookup,
    ) -> Result<Lookup, MountError> {
        match self.mounts.iter().find(|m| m.handles(name)) {
            Some(mount) => mount.read(name, options, secrets).await,
            None => Ok(Lookup::NotHandled),
        }
    }

    /// Write through the first writable mount that accepts `name`. Fails
    /// with `ReadOnly` if the name is accepted only by read-only mounts.
    pub async fn write(
        &self,
        name: &str,
        payload: Bytes,
        secrets: &dyn SecretLookup,
    ) -> Result<WriteOutcome, MountError> {
        let mut accepting = self.mounts.iter().filter(|m| m.handles(name)).peekable();
        if accepting.peek().is_none() {
            return Ok(WriteOutcome::NotHandled);
        }

        match accepting.find_map(|m| m.writer()) {
            Some(writer) => writer.write(name, payload, secrets).await,
            None => Err(MountError::ReadOnly(name.to_string())),
        }
    }
}
