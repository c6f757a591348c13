use bucketfs_common::backend::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("{0} is not set")]
    MissingCredential(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Secret lookup for {name} failed: {message}")]
    Secret { name: &'static str, message: String },
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("No writable mount for {0}")]
    ReadOnly(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
