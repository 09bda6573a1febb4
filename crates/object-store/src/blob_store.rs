//! The BlobStore capability consumed by the sync engine.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::BlobKey;

/// Opaque cursor returned by a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(pub(crate) String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A key reported by a listing, with the size the store knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedKey {
    pub key: BlobKey,
    pub size: Option<u64>,
}

/// One page of a (possibly delimited) listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Keys at this level, in store order
    pub keys: Vec<ListedKey>,
    /// One entry per "directory" below the queried prefix, each ending in `/`
    pub common_prefixes: Vec<String>,
    /// Present when more pages follow
    pub continuation: Option<ContinuationToken>,
}

impl ListingPage {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Metadata attached to an uploaded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutMetadata {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// Remote key/value blob namespace.
///
/// Implementations classify their failures into [`crate::StoreError`]
/// variants; callers rely on `NotFound` being definitive and on `Transient`
/// marking failures worth retrying.
#[async_trait::async_trait]
pub trait BlobStore: fmt::Debug + Send + Sync {
    /// Fetch the full contents of `key`.
    async fn get(&self, key: &BlobKey) -> Result<Bytes>;

    async fn put(&self, key: &BlobKey, data: Bytes, metadata: &PutMetadata) -> Result<()>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &BlobKey) -> Result<()>;

    async fn exists(&self, key: &BlobKey) -> Result<bool>;

    /// Server-side copy of `src` to `dst`.
    async fn copy(&self, src: &BlobKey, dst: &BlobKey) -> Result<()>;

    /// List one page of keys under `prefix`.
    ///
    /// With a delimiter, keys below the next delimiter are folded into
    /// `common_prefixes`. Without one, the listing is flat and recursive.
    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<char>,
        continuation: Option<&ContinuationToken>,
    ) -> Result<ListingPage>;
}
