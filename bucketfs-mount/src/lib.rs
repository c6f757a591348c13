pub mod config;
pub mod error;
pub mod mount;
pub mod pool;
pub mod reader;
pub mod record;
pub mod s3;
pub mod secrets;
pub mod table;
pub mod writer;

#[cfg(test)]
mod testing;

pub use config::{BucketfsConfig, MountConfig};
pub use error::MountError;
pub use mount::Mount;
pub use pool::ClientPool;
pub use reader::{MatchMode, ObjectReader, OutputMode, ReadOptions};
pub use record::{Content, Lookup, ReadOutput, ResultRecord, WriteOutcome};
pub use secrets::{EnvSecrets, SecretLookup, StaticSecrets};
pub use table::MountTable;
pub use writer::ObjectWriter;
