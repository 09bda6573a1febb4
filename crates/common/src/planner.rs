//! Turns a key prefix or a local root into a lazy sequence of transfer tasks.
//!
//! Both walks are driven by an explicit worklist, so deep namespaces never
//! grow the call stack. A whole level is enumerated before any of its tasks
//! are handed out, while deeper levels are discovered only as the consumer
//! keeps pulling. That lets planning run alongside the transfers it feeds.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::{BlobStore, ListedKey, StoreError, DELIMITER};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::path_mapper;
use crate::report::{Direction, PlanningError, TransferTask};
use crate::retry::RetryPolicy;

/// One item produced by a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    Task(TransferTask),
    /// Something under the tree that could not be turned into a task
    Skipped(PlanningError),
}

/// A lazy, finite sequence of plan steps.
///
/// Plans cannot be resumed; to start over, plan again.
#[async_trait::async_trait]
pub trait TaskSource: Send {
    async fn next_step(&mut self) -> Option<PlanStep>;
}

/// Produces download and upload plans.
#[derive(Debug, Clone)]
pub struct SyncPlanner {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl SyncPlanner {
    pub fn new(store: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Plan downloading everything under `key_prefix` into `local_root`.
    ///
    /// The first level is listed right away; if that fails the whole plan
    /// fails with [`SyncError::Setup`].
    pub async fn plan_download(
        &self,
        key_prefix: &str,
        local_root: &Path,
    ) -> Result<DownloadPlan, SyncError> {
        let mut plan = DownloadPlan {
            store: self.store.clone(),
            policy: self.policy,
            local_root: local_root.to_path_buf(),
            stack: Vec::new(),
        };
        let (keys, prefixes) = plan
            .list_level(key_prefix)
            .await
            .map_err(|e| SyncError::setup(key_prefix, e))?;
        plan.push_level(key_prefix, keys, prefixes);
        Ok(plan)
    }

    /// Plan uploading every regular file under `local_root` below `key_prefix`.
    ///
    /// A missing or unreadable root fails with [`SyncError::Setup`].
    pub async fn plan_upload(
        &self,
        local_root: &Path,
        key_prefix: &str,
    ) -> Result<UploadPlan, SyncError> {
        let entries = read_sorted(local_root)
            .await
            .map_err(|e| SyncError::setup(local_root.display().to_string(), e))?;
        Ok(UploadPlan {
            local_root: local_root.to_path_buf(),
            key_prefix: key_prefix.to_string(),
            stack: vec![entries],
        })
    }
}

enum Frame {
    /// A prefix whose level still has to be listed
    List(String),
    /// Keys of an already listed level
    Emit(VecDeque<ListedKey>),
}

/// Depth-first walk over a remote prefix.
///
/// Child prefixes are walked before the keys of their own level, siblings in
/// listing order.
pub struct DownloadPlan {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
    local_root: PathBuf,
    stack: Vec<Frame>,
}

impl DownloadPlan {
    /// List every page of one level.
    async fn list_level(
        &self,
        prefix: &str,
    ) -> Result<(Vec<ListedKey>, Vec<String>), StoreError> {
        let mut keys = Vec::new();
        let mut prefixes = Vec::new();
        let mut token = None;
        let mut pages = 0;

        loop {
            let store = &self.store;
            let attempted = self
                .policy
                .run("list", || store.list(prefix, Some(DELIMITER), token.as_ref()))
                .await;
            let page = attempted.result?;
            pages += 1;

            keys.extend(page.keys);
            prefixes.extend(page.common_prefixes);
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(
            prefix = prefix,
            pages = pages,
            keys = keys.len(),
            prefixes = prefixes.len(),
            "listed level"
        );
        Ok((keys, prefixes))
    }

    fn push_level(&mut self, prefix: &str, keys: Vec<ListedKey>, prefixes: Vec<String>) {
        self.stack.push(Frame::Emit(keys.into()));
        // A prefix that does not extend its parent would loop forever
        for child in prefixes.into_iter().rev() {
            if child.len() > prefix.len() && child.starts_with(prefix) {
                self.stack.push(Frame::List(child));
            } else {
                warn!(parent = prefix, child = %child, "ignoring non-descending prefix");
            }
        }
    }

    fn step_for(&self, listed: ListedKey) -> PlanStep {
        match path_mapper::remote_to_local(&listed.key, &self.local_root) {
            Ok(local_path) => PlanStep::Task(TransferTask {
                direction: Direction::Download,
                key: listed.key,
                local_path,
                size_hint: listed.size,
            }),
            Err(e) => {
                warn!(key = %listed.key, error = %e, "skipping key");
                PlanStep::Skipped(PlanningError {
                    location: listed.key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl TaskSource for DownloadPlan {
    async fn next_step(&mut self) -> Option<PlanStep> {
        loop {
            match self.stack.pop()? {
                Frame::Emit(mut keys) => {
                    if let Some(listed) = keys.pop_front() {
                        self.stack.push(Frame::Emit(keys));
                        return Some(self.step_for(listed));
                    }
                }
                Frame::List(prefix) => match self.list_level(&prefix).await {
                    Ok((keys, prefixes)) => self.push_level(&prefix, keys, prefixes),
                    Err(e) => {
                        warn!(prefix = %prefix, error = %e, "failed to list prefix");
                        return Some(PlanStep::Skipped(PlanningError {
                            location: prefix,
                            reason: e.to_string(),
                        }));
                    }
                },
            }
        }
    }
}

struct LocalEntry {
    path: PathBuf,
    file_type: std::fs::FileType,
    size: u64,
}

/// Entries of `dir`, sorted by file name. Symlinks are not followed.
async fn read_sorted(dir: &Path) -> io::Result<VecDeque<LocalEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(LocalEntry {
            path: entry.path(),
            file_type: metadata.file_type(),
            size: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(entries.into())
}

/// Depth-first, name-ordered walk over a local directory tree.
pub struct UploadPlan {
    local_root: PathBuf,
    key_prefix: String,
    stack: Vec<VecDeque<LocalEntry>>,
}

#[async_trait::async_trait]
impl TaskSource for UploadPlan {
    async fn next_step(&mut self) -> Option<PlanStep> {
        loop {
            let level = self.stack.last_mut()?;
            let Some(entry) = level.pop_front() else {
                self.stack.pop();
                continue;
            };

            if entry.file_type.is_symlink() {
                warn!(path = %entry.path.display(), "skipping symbolic link");
                continue;
            }

            if entry.file_type.is_dir() {
                match read_sorted(&entry.path).await {
                    Ok(entries) => self.stack.push(entries),
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "failed to read directory");
                        return Some(PlanStep::Skipped(PlanningError {
                            location: entry.path.display().to_string(),
                            reason: e.to_string(),
                        }));
                    }
                }
                continue;
            }

            if !entry.file_type.is_file() {
                warn!(path = %entry.path.display(), "skipping special file");
                continue;
            }

            return Some(
                match path_mapper::local_to_remote(&entry.path, &self.local_root, &self.key_prefix)
                {
                    Ok(key) => PlanStep::Task(TransferTask {
                        direction: Direction::Upload,
                        key,
                        local_path: entry.path,
                        size_hint: Some(entry.size),
                    }),
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "skipping file");
                        PlanStep::Skipped(PlanningError {
                            location: entry.path.display().to_string(),
                            reason: e.to_string(),
                        })
                    }
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use object_store::{BlobKey, ObjectStoreBackend, PutMetadata};

    async fn drain(mut source: impl TaskSource) -> Vec<PlanStep> {
        let mut steps = Vec::new();
        while let Some(step) = source.next_step().await {
            steps.push(step);
        }
        steps
    }

    fn task_keys(steps: &[PlanStep]) -> Vec<String> {
        steps
            .iter()
            .filter_map(|s| match s {
                PlanStep::Task(t) => Some(t.key.to_string()),
                PlanStep::Skipped(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_download_order_is_depth_first() {
        let store = ObjectStoreBackend::memory();
        for k in ["p/z.txt", "p/a/1.txt", "p/a/b/2.txt", "p/c/3.txt"] {
            store
                .put(&BlobKey::new(k).unwrap(), Bytes::from("x"), &PutMetadata::default())
                .await
                .unwrap();
        }
        let planner = SyncPlanner::new(Arc::new(store), RetryPolicy::default());
        let plan = planner
            .plan_download("p/", Path::new("/mirror"))
            .await
            .unwrap();

        let steps = drain(plan).await;
        assert_eq!(
            task_keys(&steps),
            vec!["p/a/b/2.txt", "p/a/1.txt", "p/c/3.txt", "p/z.txt"]
        );
        match &steps[0] {
            PlanStep::Task(t) => {
                assert_eq!(t.local_path, Path::new("/mirror/p/a/b/2.txt"));
                assert_eq!(t.size_hint, Some(1));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_empty_prefix_is_empty() {
        let planner = SyncPlanner::new(
            Arc::new(ObjectStoreBackend::memory()),
            RetryPolicy::default(),
        );
        let plan = planner
            .plan_download("nothing/here/", Path::new("/mirror"))
            .await
            .unwrap();
        assert!(drain(plan).await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_root_is_setup_error() {
        let planner = SyncPlanner::new(
            Arc::new(ObjectStoreBackend::memory()),
            RetryPolicy::default(),
        );
        let result = planner
            .plan_upload(Path::new("/definitely/not/a/dir"), "")
            .await;
        assert!(matches!(result, Err(SyncError::Setup { .. })));
    }

    #[tokio::test]
    async fn test_upload_empty_root_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let planner = SyncPlanner::new(
            Arc::new(ObjectStoreBackend::memory()),
            RetryPolicy::default(),
        );
        let plan = planner.plan_upload(temp.path(), "site").await.unwrap();
        assert!(drain(plan).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_skips_symlinks() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real.txt"), temp.path().join("link.txt"))
            .unwrap();

        let planner = SyncPlanner::new(
            Arc::new(ObjectStoreBackend::memory()),
            RetryPolicy::default(),
        );
        let plan = planner.plan_upload(temp.path(), "").await.unwrap();
        assert_eq!(task_keys(&drain(plan).await), vec!["real.txt"]);
    }
}
