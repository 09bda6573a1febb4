//! Blob store capability
//!
//! This crate defines the [`BlobStore`] trait the sync engine consumes and an
//! implementation backed by the `object_store` crate with pluggable backends
//! (S3/MinIO/local filesystem/memory).
//!
//! # Example
//!
//! ```rust,no_run
//! use blobsync_object_store::{BlobKey, BlobStore, ObjectStoreBackend, ObjectStoreConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), blobsync_object_store::StoreError> {
//! let store = ObjectStoreBackend::new(ObjectStoreConfig::Local {
//!     path: PathBuf::from("/tmp/objects"),
//! })
//! .await?;
//!
//! let key = BlobKey::new("site/index.html")?;
//! let found = store.exists(&key).await?;
//! # Ok(())
//! # }
//! ```

mod blob_store;
mod error;
mod key;
mod storage;

pub use blob_store::{BlobStore, ContinuationToken, ListedKey, ListingPage, PutMetadata};
pub use error::{Result, StoreError};
pub use key::{BlobKey, DELIMITER};
pub use storage::{ObjectStoreBackend, ObjectStoreConfig, DEFAULT_PAGE_SIZE};
