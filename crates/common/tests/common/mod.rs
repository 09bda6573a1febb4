//! Shared test utilities for engine integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ::common::prelude::*;
use bytes::Bytes;
use object_store::{ContinuationToken, ListingPage, PutMetadata, StoreError};
use parking_lot::Mutex;

type GetHook = Box<dyn Fn(u32) + Send + Sync>;

/// In-memory store that can be told to fail or to call back on access.
pub struct ScriptedStore {
    inner: ObjectStoreBackend,
    /// Remaining transient failures per key, consumed by get and put
    failures: Mutex<HashMap<String, u32>>,
    /// Remaining transient failures for listing any prefix
    list_failures: Mutex<HashMap<String, u32>>,
    gets: Mutex<u32>,
    puts: Mutex<Vec<(String, PutMetadata)>>,
    /// Gets currently running and the most ever running at once
    in_flight: Mutex<(u32, u32)>,
    get_delay: Option<Duration>,
    on_get: Option<GetHook>,
}

impl fmt::Debug for ScriptedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedStore")
            .field("gets", &*self.gets.lock())
            .finish()
    }
}

impl ScriptedStore {
    pub fn new(inner: ObjectStoreBackend) -> Self {
        Self {
            inner,
            failures: Mutex::new(HashMap::new()),
            list_failures: Mutex::new(HashMap::new()),
            gets: Mutex::new(0),
            puts: Mutex::new(Vec::new()),
            in_flight: Mutex::new((0, 0)),
            get_delay: None,
            on_get: None,
        }
    }

    /// Fail the next `times` get/put calls for `key` with a transient error.
    pub fn fail_transiently(&self, key: &str, times: u32) {
        self.failures.lock().insert(key.to_string(), times);
    }

    /// Fail the next `times` listings of `prefix` with a transient error.
    pub fn fail_listing(&self, prefix: &str, times: u32) {
        self.list_failures.lock().insert(prefix.to_string(), times);
    }

    /// Call `hook` with the running get count after every get.
    pub fn with_get_hook(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_get = Some(Box::new(hook));
        self
    }

    /// Hold every get open for `delay` so concurrent gets overlap.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    /// Most gets that were ever running at the same time.
    pub fn max_in_flight(&self) -> u32 {
        self.in_flight.lock().1
    }

    pub fn gets(&self) -> u32 {
        *self.gets.lock()
    }

    pub fn puts(&self) -> Vec<(String, PutMetadata)> {
        self.puts.lock().clone()
    }

    fn take_failure(map: &Mutex<HashMap<String, u32>>, name: &str) -> Result<(), StoreError> {
        let mut map = map.lock();
        match map.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Transient(format!("scripted failure for {}", name)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for ScriptedStore {
    async fn get(&self, key: &BlobKey) -> Result<Bytes, StoreError> {
        let count = {
            let mut gets = self.gets.lock();
            *gets += 1;
            *gets
        };
        {
            let mut in_flight = self.in_flight.lock();
            in_flight.0 += 1;
            in_flight.1 = in_flight.1.max(in_flight.0);
        }
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let result = match Self::take_failure(&self.failures, key.as_str()) {
            Ok(()) => self.inner.get(key).await,
            Err(e) => Err(e),
        };
        self.in_flight.lock().0 -= 1;
        if let Some(hook) = &self.on_get {
            hook(count);
        }
        result
    }

    async fn put(&self, key: &BlobKey, data: Bytes, metadata: &PutMetadata) -> Result<(), StoreError> {
        Self::take_failure(&self.failures, key.as_str())?;
        self.puts
            .lock()
            .push((key.to_string(), metadata.clone()));
        self.inner.put(key, data, metadata).await
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn copy(&self, src: &BlobKey, dst: &BlobKey) -> Result<(), StoreError> {
        self.inner.copy(src, dst).await
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<char>,
        continuation: Option<&ContinuationToken>,
    ) -> Result<ListingPage, StoreError> {
        Self::take_failure(&self.list_failures, prefix)?;
        self.inner.list(prefix, delimiter, continuation).await
    }
}

pub fn key(s: &str) -> BlobKey {
    BlobKey::new(s).unwrap()
}

/// Memory backend seeded with `keys`, each holding its own name as content.
pub async fn seeded_backend(keys: &[&str], page_size: usize) -> ObjectStoreBackend {
    let backend = ObjectStoreBackend::memory().with_page_size(page_size);
    for k in keys {
        backend
            .put(&key(k), Bytes::from(k.to_string()), &PutMetadata::default())
            .await
            .unwrap();
    }
    backend
}

/// Config with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        retry_base_delay_ms: 1,
        timeout_ms: 5_000,
        ..Default::default()
    }
}

pub fn engine(store: Arc<dyn BlobStore>, config: SyncConfig) -> SyncEngine {
    SyncEngine::new(store, config).unwrap()
}

/// Write `files` (relative path, contents) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}
