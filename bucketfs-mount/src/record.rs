use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use bucketfs_common::content::ContentKind;

use crate::error::MountError;

/// Materialized object content. Text is decoded lossily as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Bytes),
}

impl Content {
    pub fn from_body(kind: ContentKind, body: Bytes) -> Self {
        match kind {
            ContentKind::Text => Content::Text(String::from_utf8_lossy(&body).into_owned()),
            ContentKind::Image => Content::Bytes(body),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text.as_str()),
            Content::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Bytes(bytes) => bytes.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deferred content accessor carried by a record.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn load(&self) -> Result<Content, MountError>;
}

/// Content that was fetched eagerly and is handed back on every call.
pub struct Buffered(pub Content);

#[async_trait]
impl ContentSource for Buffered {
    async fn load(&self) -> Result<Content, MountError> {
        Ok(self.0.clone())
    }
}

/// One entry produced by a read.
#[derive(Clone)]
pub struct ResultRecord {
    pub kind: ContentKind,
    pub name: String,
    pub mimetype: Option<String>,
    /// Bucket the record came from.
    pub source: String,
    reader: Arc<dyn ContentSource>,
}

impl ResultRecord {
    pub fn new(
        kind: ContentKind,
        name: impl Into<String>,
        mimetype: Option<String>,
        source: impl Into<String>,
        reader: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            mimetype,
            source: source.into(),
            reader,
        }
    }

    /// Materialize the record's content. May be called any number of
    /// times; deferred sources go back to the backend on each call.
    pub async fn read(&self) -> Result<Content, MountError> {
        self.reader.load().await
    }
}

impl fmt::Debug for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRecord")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("mimetype", &self.mimetype)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum ReadOutput {
    One(ResultRecord),
    All(Vec<ResultRecord>),
}

impl ReadOutput {
    pub fn into_records(self) -> Vec<ResultRecord> {
        match self {
            ReadOutput::One(record) => vec![record],
            ReadOutput::All(records) => records,
        }
    }
}

/// Outcome of a read. Keeps "not my mount" apart from "no such object".
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The name lies outside this mount; the backend was not contacted.
    NotHandled,
    /// The name is in this mount but nothing matched.
    Missing,
    Found(ReadOutput),
}

impl Lookup {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Lookup::NotHandled)
    }

    /// Collapse both kinds of absence into `None`.
    pub fn into_output(self) -> Option<ReadOutput> {
        match self {
            Lookup::Found(output) => Some(output),
            Lookup::NotHandled | Lookup::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    NotHandled,
}
