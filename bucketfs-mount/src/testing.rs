//! In-memory doubles for the storage layer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use bucketfs_common::backend::{ListRequest, ListResponse, ObjectStore, StoreError};

use crate::error::MountError;
use crate::pool::{ClientFactory, ClientSpec};

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, (Bytes, Option<String>)>>,
    calls: AtomicUsize,
    deny: AtomicBool,
    last_list: Mutex<Option<ListRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), (data.into(), None));
    }

    pub fn remove(&self, key: &str) {
        self.objects.write().unwrap().remove(key);
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .and_then(|(_, ct)| ct.clone())
    }

    /// Number of backend operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent listing request, as the reader issued it.
    pub fn last_list(&self) -> Option<ListRequest> {
        self.last_list.lock().unwrap().clone()
    }

    /// Make every subsequent operation fail with AccessDenied.
    pub fn deny_all(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    fn enter(&self, operation: &'static str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(StoreError::Http {
                operation,
                status: 403,
                code: "AccessDenied".into(),
                message: "Access Denied".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        self.enter("GET")?;
        self.object(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.enter("PUT")?;
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), (data, content_type.map(str::to_string)));
        Ok(())
    }

    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse, StoreError> {
        self.enter("LIST")?;
        *self.last_list.lock().unwrap() = Some(request.clone());
        let objects = self.objects.read().unwrap();
        let limit = request.max_keys as usize;

        let mut keys = Vec::new();
        let mut prefixes = BTreeSet::new();
        for key in objects.keys().filter(|k| k.starts_with(&request.prefix)) {
            if keys.len() + prefixes.len() >= limit {
                break;
            }
            let rest = &key[request.prefix.len()..];
            match request.delimiter.as_deref().and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    prefixes.insert(format!("{}{}", request.prefix, &rest[..end]));
                }
                None => keys.push(key.clone()),
            }
        }

        Ok(ListResponse::new(keys, prefixes.into_iter().collect()))
    }
}

/// Factory handing out one shared store and counting constructions.
pub struct CountingFactory {
    store: Arc<MemoryStore>,
    builds: AtomicUsize,
    last_spec: Mutex<Option<ClientSpec>>,
}

impl CountingFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            builds: AtomicUsize::new(0),
            last_spec: Mutex::new(None),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<ClientSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

impl ClientFactory for CountingFactory {
    fn build(&self, spec: &ClientSpec) -> Result<Arc<dyn ObjectStore>, MountError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        Ok(self.store.clone())
    }
}
