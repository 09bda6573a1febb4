//! Object storage backend (S3/MinIO/local filesystem/memory) behind the
//! [`BlobStore`] capability.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blob_store::{BlobStore, ContinuationToken, ListedKey, ListingPage, PutMetadata};
use crate::error::{Result, StoreError};
use crate::key::{BlobKey, DELIMITER};

/// Default number of entries returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Delimited levels kept between the pages of one continuation chain.
const LEVEL_CACHE_CAPACITY: usize = 64;

/// Configuration for the object storage backend.
///
/// Credentials live here and nowhere else; the backend never falls back to
/// ambient process-wide sessions.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// One entry of a listing before pagination.
#[derive(Debug, Clone)]
enum Entry {
    Prefix(String),
    Object { key: String, size: u64 },
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Prefix(p) => p,
            Entry::Object { key, .. } => key,
        }
    }
}

/// [`BlobStore`] over any `object_store` implementation.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
    /// Whether the backend accepts content-type / cache-control attributes
    attributes: bool,
    /// Whether `list` streams locations in lexicographic order
    ordered: bool,
    page_size: usize,
    /// Sorted delimited levels with pages still to be served, by prefix
    levels: Arc<Mutex<HashMap<String, Arc<Vec<Entry>>>>>,
}

impl ObjectStoreBackend {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let (inner, attributes, ordered): (Arc<dyn ObjectStore>, bool, bool) = match &config {
            ObjectStoreConfig::Memory => (Arc::new(InMemory::new()), true, true),

            ObjectStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                let store = LocalFileSystem::new_with_prefix(path)
                    .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
                // The local filesystem keeps bytes only and walks directories
                // in no particular order
                (Arc::new(store), false, false)
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| StoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                let mut stream = store.list(None);
                match stream.try_next().await {
                    Ok(_) => {}
                    Err(object_store::Error::NotFound { .. }) => {
                        return Err(StoreError::BucketNotFound(bucket.clone()));
                    }
                    Err(e) => {
                        let msg = e.to_string();
                        if msg.contains("NoSuchBucket") {
                            return Err(StoreError::BucketNotFound(bucket.clone()));
                        }
                        return Err(e.into());
                    }
                }
                drop(stream);

                // S3 returns keys in UTF-8 binary order
                (store, true, true)
            }
        };

        Ok(Self::from_store(inner, attributes).with_ordered_listing(ordered))
    }

    /// Wrap an existing `object_store` implementation.
    ///
    /// Listings are not assumed to be ordered; see
    /// [`ObjectStoreBackend::with_ordered_listing`].
    pub fn from_store(inner: Arc<dyn ObjectStore>, attributes: bool) -> Self {
        Self {
            inner,
            attributes,
            ordered: false,
            page_size: DEFAULT_PAGE_SIZE,
            levels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create an in-memory storage backend.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), true).with_ordered_listing(true)
    }

    /// Declare that the wrapped store lists locations in lexicographic order,
    /// which lets a flat page stop reading as soon as it is full.
    pub fn with_ordered_listing(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Set the maximum number of entries per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn object_path(key: &BlobKey) -> Result<ObjectPath> {
        ObjectPath::parse(key.as_str()).map_err(|_| StoreError::InvalidKey {
            key: key.to_string(),
            reason: "not a valid object path",
        })
    }

    /// Split a string prefix into the directory to list and the filter
    /// entries must match.
    ///
    /// `object_store` lists whole path segments, so `docs/ind` lists `docs/`
    /// and keeps entries starting with `docs/ind`.
    fn split_prefix(prefix: &str) -> (Option<ObjectPath>, &str) {
        match prefix.rfind(DELIMITER) {
            Some(idx) => (Some(ObjectPath::from(&prefix[..idx])), prefix),
            None => (None, prefix),
        }
    }

    fn attributes_for(metadata: &PutMetadata) -> Attributes {
        let mut attributes = Attributes::new();
        if let Some(content_type) = &metadata.content_type {
            attributes.insert(Attribute::ContentType, content_type.clone().into());
        }
        if let Some(cache_control) = &metadata.cache_control {
            attributes.insert(Attribute::CacheControl, cache_control.clone().into());
        }
        attributes
    }
}

#[async_trait::async_trait]
impl BlobStore for ObjectStoreBackend {
    async fn get(&self, key: &BlobKey) -> Result<Bytes> {
        let path = Self::object_path(key)?;
        let result = self.inner.get(&path).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, key: &BlobKey, data: Bytes, metadata: &PutMetadata) -> Result<()> {
        let path = Self::object_path(key)?;
        let size = data.len();
        if self.attributes {
            let opts = PutOptions {
                attributes: Self::attributes_for(metadata),
                ..Default::default()
            };
            self.inner.put_opts(&path, data.into(), opts).await?;
        } else {
            self.inner.put(&path, data.into()).await?;
        }
        debug!(key = %key, size = size, "object stored");
        Ok(())
    }

    async fn delete(&self, key: &BlobKey) -> Result<()> {
        let path = Self::object_path(key)?;
        // The object may already be gone
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool> {
        let path = Self::object_path(key)?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, src: &BlobKey, dst: &BlobKey) -> Result<()> {
        let from = Self::object_path(src)?;
        let to = Self::object_path(dst)?;
        self.inner.copy(&from, &to).await?;
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<char>,
        continuation: Option<&ContinuationToken>,
    ) -> Result<ListingPage> {
        let after = continuation.map(ContinuationToken::as_str);
        let (entries, continuation) = match delimiter {
            Some(DELIMITER) => self.list_delimited(prefix, after).await?,
            Some(other) => {
                return Err(StoreError::InvalidConfig(format!(
                    "unsupported listing delimiter {:?}",
                    other
                )))
            }
            None => self.list_flat(prefix, after).await?,
        };

        let mut page = ListingPage {
            continuation,
            ..Default::default()
        };
        for entry in entries {
            match entry {
                Entry::Prefix(p) => page.common_prefixes.push(p),
                Entry::Object { key, size } => page.keys.push(ListedKey {
                    key: BlobKey::new(key)?,
                    size: Some(size),
                }),
            }
        }

        debug!(
            prefix = prefix,
            keys = page.keys.len(),
            prefixes = page.common_prefixes.len(),
            more = !page.is_last(),
            "listed page"
        );
        Ok(page)
    }
}

impl ObjectStoreBackend {
    /// One page of a recursive listing, resuming after `after`.
    ///
    /// Only the smallest `page_size + 1` matching locations are held at a
    /// time. On an ordered store the stream is abandoned once the page is
    /// full or the prefix range has been passed.
    async fn list_flat(
        &self,
        prefix: &str,
        after: Option<&str>,
    ) -> Result<(Vec<Entry>, Option<ContinuationToken>)> {
        let (dir, filter) = Self::split_prefix(prefix);
        let mut stream = match after {
            Some(token) => self
                .inner
                .list_with_offset(dir.as_ref(), &ObjectPath::from(token)),
            None => self.inner.list(dir.as_ref()),
        };

        let limit = self.page_size + 1;
        let mut window: BTreeMap<String, u64> = BTreeMap::new();
        while let Some(meta) = stream.try_next().await? {
            let key = meta.location.to_string();
            if !key.starts_with(filter) {
                if self.ordered && key.as_str() > filter {
                    break;
                }
                continue;
            }
            if after.is_some_and(|token| key.as_str() <= token) {
                continue;
            }
            window.insert(key, meta.size as u64);
            if window.len() > limit {
                window.pop_last();
            }
            if self.ordered && window.len() == limit {
                break;
            }
        }

        let continuation = if window.len() > self.page_size {
            window.pop_last();
            window.keys().next_back().map(|k| ContinuationToken::new(k.as_str()))
        } else {
            None
        };
        let entries = window
            .into_iter()
            .map(|(key, size)| Entry::Object { key, size })
            .collect();
        Ok((entries, continuation))
    }

    /// One page of a single delimited level.
    ///
    /// The backend can only return a level whole, so the sorted level is
    /// kept until its last page has been served and later pages of the same
    /// chain are cut from it.
    async fn list_delimited(
        &self,
        prefix: &str,
        after: Option<&str>,
    ) -> Result<(Vec<Entry>, Option<ContinuationToken>)> {
        let cached = match after {
            Some(_) => self.levels.lock().get(prefix).cloned(),
            None => None,
        };
        let level = match cached {
            Some(level) => level,
            None => Arc::new(self.read_level(prefix).await?),
        };

        let start = match after {
            Some(token) => level.partition_point(|e| e.name() <= token),
            None => 0,
        };
        let end = (start + self.page_size).min(level.len());
        let continuation = if end < level.len() {
            Some(ContinuationToken::new(level[end - 1].name()))
        } else {
            None
        };

        let mut levels = self.levels.lock();
        if continuation.is_some() {
            if levels.len() >= LEVEL_CACHE_CAPACITY && !levels.contains_key(prefix) {
                levels.clear();
            }
            levels.insert(prefix.to_string(), level.clone());
        } else {
            levels.remove(prefix);
        }
        drop(levels);

        Ok((level[start..end].to_vec(), continuation))
    }

    async fn read_level(&self, prefix: &str) -> Result<Vec<Entry>> {
        let (dir, filter) = Self::split_prefix(prefix);
        let result = self.inner.list_with_delimiter(dir.as_ref()).await?;
        let mut entries: Vec<Entry> = result
            .common_prefixes
            .into_iter()
            .map(|p| Entry::Prefix(format!("{}{}", p, DELIMITER)))
            .chain(result.objects.into_iter().map(|meta| Entry::Object {
                key: meta.location.to_string(),
                size: meta.size as u64,
            }))
            .filter(|e| e.name().starts_with(filter))
            .collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entries)
    }
}
