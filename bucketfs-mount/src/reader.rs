//! Read paths of a mount: single objects, prefix listings and synthesized
//! directory listings.
//!
//! Single-object reads fetch eagerly, so backend errors surface from the
//! read call itself. Listings hand back records whose content is fetched
//! only when the record is read, so their errors surface there.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use bucketfs_common::backend::{ListRequest, ListResponse, ObjectStore, StoreError};
use bucketfs_common::content::{mime_type, ContentKind};
use bucketfs_common::keys::{KeyResolver, SEPARATOR};

use crate::error::MountError;
use crate::mount::MountState;
use crate::record::{Buffered, Content, ContentSource, Lookup, ReadOutput, ResultRecord};
use crate::secrets::SecretLookup;

pub const LIST_MAX_KEYS: u32 = 1000;
pub const DIRECTORY_MAX_KEYS: u32 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Exact,
    /// Enumerate every object under the resolved key.
    Regex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// First record only, or nothing.
    #[default]
    First,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub match_mode: MatchMode,
    pub output: OutputMode,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from the host's loosely typed `match` / `output`
    /// arguments. Unknown values fall back to the defaults.
    pub fn from_args(match_arg: Option<&str>, output_arg: Option<&str>) -> Self {
        Self {
            match_mode: match match_arg {
                Some("regex") => MatchMode::Regex,
                _ => MatchMode::Exact,
            },
            output: match output_arg {
                Some("all") => OutputMode::All,
                _ => OutputMode::First,
            },
        }
    }

    pub fn regex(mut self) -> Self {
        self.match_mode = MatchMode::Regex;
        self
    }

    pub fn all(mut self) -> Self {
        self.output = OutputMode::All;
        self
    }
}

pub struct ObjectReader {
    state: Arc<MountState>,
}

impl ObjectReader {
    pub(crate) fn new(state: Arc<MountState>) -> Self {
        Self { state }
    }

    pub async fn read(
        &self,
        name: &str,
        options: &ReadOptions,
        secrets: &dyn SecretLookup,
    ) -> Result<Lookup, MountError> {
        let Some(key) = self.state.resolver.resolve(name) else {
            debug!(bucket = %self.state.config.bucket, name, "Name outside mount");
            return Ok(Lookup::NotHandled);
        };

        let store = self.state.client(secrets).await?;

        let records = if name.ends_with(SEPARATOR) {
            vec![self.directory(store, name, &key)]
        } else if options.match_mode == MatchMode::Regex {
            self.list_matching(store, &key).await?
        } else {
            self.fetch(&store, name, &key).await?.into_iter().collect()
        };

        Ok(match options.output {
            OutputMode::All => Lookup::Found(ReadOutput::All(records)),
            OutputMode::First => match records.into_iter().next() {
                Some(record) => Lookup::Found(ReadOutput::One(record)),
                None => Lookup::Missing,
            },
        })
    }

    /// Flat listing under `key`. Each record fetches its object when read.
    ///
    /// The key is used as a plain prefix. It is neither compiled nor applied
    /// as a pattern, so keys with regex metacharacters list like any other.
    async fn list_matching(
        &self,
        store: Arc<dyn ObjectStore>,
        key: &str,
    ) -> Result<Vec<ResultRecord>, MountError> {
        let listing = store
            .list_objects(&ListRequest::flat(key, LIST_MAX_KEYS))
            .await?;
        debug!(
            bucket = %self.state.config.bucket,
            prefix = %key,
            count = listing.keys.len(),
            "Prefix listing"
        );

        Ok(listing
            .keys
            .into_iter()
            .map(|object_key| {
                let reader = Arc::new(ObjectFetch {
                    store: store.clone(),
                    key: object_key.clone(),
                });
                ResultRecord::new(
                    ContentKind::classify(&object_key),
                    object_key.as_str(),
                    mime_type(&object_key),
                    self.state.config.bucket.as_str(),
                    reader,
                )
            })
            .collect())
    }

    /// A single text record whose content is the rendered listing.
    fn directory(&self, store: Arc<dyn ObjectStore>, name: &str, key: &str) -> ResultRecord {
        let reader = Arc::new(DirectoryListing {
            store,
            name: name.to_string(),
            prefix: key.to_string(),
            resolver: self.state.resolver.clone(),
        });
        ResultRecord::new(
            ContentKind::Text,
            name,
            None,
            self.state.config.bucket.as_str(),
            reader,
        )
    }

    /// Eager fetch. A missing key is `Ok(None)`, not an error.
    async fn fetch(
        &self,
        store: &Arc<dyn ObjectStore>,
        name: &str,
        key: &str,
    ) -> Result<Option<ResultRecord>, MountError> {
        let body = match store.get_object(key).await {
            Ok(body) => body,
            Err(StoreError::NotFound(_)) => {
                debug!(bucket = %self.state.config.bucket, key, "Object not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let content = Content::from_body(ContentKind::classify(key), body);
        Ok(Some(ResultRecord::new(
            ContentKind::classify(name),
            name,
            mime_type(name),
            self.state.config.bucket.as_str(),
            Arc::new(Buffered(content)),
        )))
    }
}

/// Deferred fetch of one listed object.
struct ObjectFetch {
    store: Arc<dyn ObjectStore>,
    key: String,
}

#[async_trait]
impl ContentSource for ObjectFetch {
    async fn load(&self) -> Result<Content, MountError> {
        match self.store.get_object(&self.key).await {
            Ok(body) => Ok(Content::from_body(ContentKind::classify(&self.key), body)),
            Err(StoreError::NotFound(key)) => Err(MountError::NotFound(key)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Deferred delimited listing, rendered as text.
struct DirectoryListing {
    store: Arc<dyn ObjectStore>,
    name: String,
    prefix: String,
    resolver: KeyResolver,
}

#[async_trait]
impl ContentSource for DirectoryListing {
    async fn load(&self) -> Result<Content, MountError> {
        let listing = self
            .store
            .list_objects(&ListRequest::delimited(
                &self.prefix,
                SEPARATOR,
                DIRECTORY_MAX_KEYS,
            ))
            .await?;
        Ok(Content::Text(render_directory(
            &self.name,
            &listing,
            &self.resolver,
        )))
    }
}

/// Subdirectories first, then files, one per line, base path stripped.
pub fn render_directory(name: &str, listing: &ListResponse, resolver: &KeyResolver) -> String {
    if listing.is_empty() {
        return format!("Directory '{}' is empty", name);
    }

    let dirs: Vec<&str> = listing
        .common_prefixes
        .iter()
        .map(|p| resolver.display_key(p))
        .collect();
    let files: Vec<&str> = listing
        .keys
        .iter()
        .map(|k| resolver.display_key(k))
        .collect();

    format!(
        "Directory '{}':\n{}\n{}",
        name,
        dirs.join("\n"),
        files.join("\n")
    )
}
