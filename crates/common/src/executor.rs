//! Executes individual transfer tasks against a [`BlobStore`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::{BlobKey, BlobStore, PutMetadata, StoreError};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::path_mapper;
use crate::report::{Direction, FailureReason, TransferResult, TransferTask};
use crate::retry::{Attempted, RetryPolicy};

/// Suffix of the temporary file a download is written to before the rename.
const PART_SUFFIX: &str = ".blobsync-part";

/// Performs transfers with retry and error classification.
///
/// Holds no state between calls beyond its configuration.
#[derive(Debug, Clone)]
pub struct TransferExecutor {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
    cache_control: String,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn BlobStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            policy: config.retry_policy(),
            cache_control: config.cache_control(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one task to completion. Never panics or errors; the outcome is in
    /// the returned result.
    pub async fn execute(&self, task: TransferTask) -> TransferResult {
        let result = match task.direction {
            Direction::Download => self.download(task).await,
            Direction::Upload => self.upload(task).await,
        };

        match result.failure() {
            None => debug!(
                key = %result.task.key,
                direction = %result.task.direction,
                bytes = result.bytes_transferred,
                retries = result.retries,
                "transfer complete"
            ),
            Some(reason) => warn!(
                key = %result.task.key,
                direction = %result.task.direction,
                retries = result.retries,
                reason = %reason,
                "transfer failed"
            ),
        }
        result
    }

    async fn download(&self, task: TransferTask) -> TransferResult {
        let store = &self.store;
        let key = &task.key;
        let Attempted { result, retries } = self.policy.run("get", || store.get(key)).await;

        let data = match result {
            Ok(data) => data,
            Err(e) => return TransferResult::failed(task, classify(e), retries),
        };

        if let Err(e) = write_atomically(&task.local_path, &data).await {
            return TransferResult::failed(task, FailureReason::Local(e.to_string()), retries);
        }
        TransferResult::success(task, data.len() as u64, retries)
    }

    async fn upload(&self, task: TransferTask) -> TransferResult {
        let data = match tokio::fs::read(&task.local_path).await {
            Ok(data) => Bytes::from(data),
            Err(e) => return TransferResult::failed(task, FailureReason::Local(e.to_string()), 0),
        };

        let metadata = PutMetadata {
            content_type: Some(mime_type(&task.local_path)),
            cache_control: Some(self.cache_control.clone()),
        };

        let store = &self.store;
        let key = &task.key;
        let Attempted { result, retries } = self
            .policy
            .run("put", || store.put(key, data.clone(), &metadata))
            .await;

        match result {
            Ok(()) => TransferResult::success(task, data.len() as u64, retries),
            Err(e) => TransferResult::failed(task, classify(e), retries),
        }
    }

    /// Server-side copy. Any failure is logged and reported as `false` so a
    /// batch of copies can carry on.
    pub async fn copy(&self, src: &BlobKey, dst: &BlobKey) -> bool {
        match self.store.copy(src, dst).await {
            Ok(()) => true,
            Err(e) => {
                warn!(src = %src, dst = %dst, error = %e, "copy failed");
                false
            }
        }
    }

    /// Delete a key. Any failure is logged and reported as `false`.
    pub async fn delete(&self, key: &BlobKey) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "delete failed");
                false
            }
        }
    }
}

fn classify(err: StoreError) -> FailureReason {
    match err {
        StoreError::NotFound(_) => FailureReason::MissingRemote,
        StoreError::Transient(e) => FailureReason::Transient(e),
        StoreError::InvalidKey { key, reason } => {
            FailureReason::InvalidPath(format!("{}: {}", key, reason))
        }
        StoreError::Io(e) => FailureReason::Local(e.to_string()),
        e => FailureReason::Permanent(e.to_string()),
    }
}

/// MIME type from the file extension, `application/octet-stream` otherwise.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}

/// Write `data` next to `path` and rename it into place, so the target never
/// holds a partial file.
async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    path_mapper::ensure_parent(path).await?;
    let part = part_path(path);
    if let Err(e) = tokio::fs::write(&part, data).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&part, path).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e);
    }
    Ok(())
}
