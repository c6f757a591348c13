use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use bucketfs_common::content::mime_type;

use crate::error::MountError;
use crate::mount::MountState;
use crate::record::WriteOutcome;
use crate::secrets::SecretLookup;

/// Write capability of a mount. Only exists on mounts configured with
/// `write = true`.
pub struct ObjectWriter {
    state: Arc<MountState>,
}

impl ObjectWriter {
    pub(crate) fn new(state: Arc<MountState>) -> Self {
        Self { state }
    }

    /// Store `payload` under the key `name` resolves to. The content type
    /// is guessed from the resolved key's extension.
    pub async fn write(
        &self,
        name: &str,
        payload: Bytes,
        secrets: &dyn SecretLookup,
    ) -> Result<WriteOutcome, MountError> {
        let Some(key) = self.state.resolver.resolve(name) else {
            debug!(bucket = %self.state.config.bucket, name, "Name outside mount");
            return Ok(WriteOutcome::NotHandled);
        };

        let store = self.state.client(secrets).await?;
        let content_type = mime_type(&key);
        let len = payload.len();
        store
            .put_object(&key, payload, content_type.as_deref())
            .await?;

        debug!(
            bucket = %self.state.config.bucket,
            key = %key,
            bytes = len,
            "Object written"
        );
        Ok(WriteOutcome::Written)
    }
}
