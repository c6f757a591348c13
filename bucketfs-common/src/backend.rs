use bytes::Bytes;

/// Trait implemented by every object-storage client a mount can talk to.
///
/// A store is bound to a single bucket. It only moves bytes: key
/// resolution, content classification and directory synthesis happen in
/// the mount layer above it.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full body of the object stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Store `data` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Enumerate objects (and, with a delimiter, common prefixes) under a prefix.
    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: u32,
}

impl ListRequest {
    /// Flat enumeration: every key under `prefix`, no grouping.
    pub fn flat(prefix: impl Into<String>, max_keys: u32) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            max_keys,
        }
    }

    /// Directory-style enumeration grouped on `delimiter`.
    pub fn delimited(prefix: impl Into<String>, delimiter: char, max_keys: u32) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(delimiter.to_string()),
            max_keys,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
    /// Keys plus common prefixes, as reported by the backend.
    pub key_count: usize,
}

impl ListResponse {
    pub fn new(keys: Vec<String>, common_prefixes: Vec<String>) -> Self {
        let key_count = keys.len() + common_prefixes.len();
        Self {
            keys,
            common_prefixes,
            key_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No such key: {0}")]
    NotFound(String),
    #[error("{operation} failed: HTTP {status} {code} - {message}")]
    Http {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
