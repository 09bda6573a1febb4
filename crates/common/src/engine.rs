//! Mirror orchestration: planner → worker pool → report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::join_all;
use object_store::{BlobKey, BlobStore};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::executor::TransferExecutor;
use crate::planner::{PlanStep, SyncPlanner, TaskSource};
use crate::report::{Direction, PlanningError, SyncReport, TransferResult, TransferTask};

/// Everything the aggregator collects.
enum Event {
    Transfer(TransferResult),
    Planning(PlanningError),
}

/// Top-level entry point for mirroring and single-object operations.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: Arc<dyn BlobStore>,
    config: SyncConfig,
    planner: SyncPlanner,
    executor: TransferExecutor,
}

impl SyncEngine {
    /// Build an engine, rejecting invalid configuration up front.
    pub fn new(store: Arc<dyn BlobStore>, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            planner: SyncPlanner::new(store.clone(), config.retry_policy()),
            executor: TransferExecutor::new(store.clone(), &config),
            store,
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn executor(&self) -> &TransferExecutor {
        &self.executor
    }

    /// Mirror `key_prefix` and `local_root` in the given direction.
    ///
    /// Individual transfer failures end up in [`SyncReport::failed`]; only a
    /// failure to start the walk is returned as an error. Once `cancel` fires,
    /// transfers already running finish, and everything not yet started is
    /// reported as cancelled.
    pub async fn mirror(
        &self,
        direction: Direction,
        key_prefix: &str,
        local_root: &Path,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let source: Box<dyn TaskSource> = match direction {
            Direction::Download => {
                Box::new(self.planner.plan_download(key_prefix, local_root).await?)
            }
            Direction::Upload => Box::new(self.planner.plan_upload(local_root, key_prefix).await?),
        };

        info!(
            direction = %direction,
            prefix = key_prefix,
            root = %local_root.display(),
            workers = self.config.worker_pool_size,
            "mirror started"
        );

        let report = self.run(source, cancel).await;

        info!(
            direction = %direction,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled().count(),
            planning_errors = report.planning_errors.len(),
            bytes = report.bytes_transferred(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mirror finished"
        );
        Ok(report)
    }

    /// Feed planned tasks to the worker pool and collect the results.
    async fn run(&self, mut source: Box<dyn TaskSource>, cancel: &CancelToken) -> SyncReport {
        let pool_size = self.config.worker_pool_size;
        let (task_tx, task_rx) = flume::bounded::<TransferTask>(pool_size);
        let (event_tx, event_rx) = flume::unbounded::<Event>();

        // Single owner of the report
        let aggregator = tokio::spawn(async move {
            let mut report = SyncReport::default();
            while let Ok(event) = event_rx.recv_async().await {
                match event {
                    Event::Transfer(result) => report.record(result),
                    Event::Planning(e) => report.planning_errors.push(e),
                }
            }
            report
        });

        let workers: Vec<_> = (0..pool_size)
            .map(|_| {
                let tasks = task_rx.clone();
                let events = event_tx.clone();
                let executor = self.executor.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    while let Ok(task) = tasks.recv_async().await {
                        let result = if cancel.is_cancelled() {
                            TransferResult::cancelled(task)
                        } else {
                            executor.execute(task).await
                        };
                        if events.send(Event::Transfer(result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(task_rx);

        while let Some(step) = source.next_step().await {
            let event = match step {
                PlanStep::Skipped(e) => Event::Planning(e),
                PlanStep::Task(task) if cancel.is_cancelled() => {
                    Event::Transfer(TransferResult::cancelled(task))
                }
                PlanStep::Task(task) => match task_tx.send_async(task).await {
                    Ok(()) => continue,
                    // Every worker is gone; nothing will run this task
                    Err(flume::SendError(task)) => {
                        Event::Transfer(TransferResult::cancelled(task))
                    }
                },
            };
            let _ = event_tx.send(event);
        }

        drop(task_tx);
        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!(error = %e, "transfer worker crashed");
            }
        }
        drop(event_tx);

        match aggregator.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "report aggregator crashed");
                SyncReport::default()
            }
        }
    }

    /// Whether `key` exists. A single attempt; any failure reads as `false`.
    pub async fn exists(&self, key: &BlobKey) -> bool {
        let timeout = self.executor.policy().timeout;
        match tokio::time::timeout(timeout, self.store.exists(key)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "existence check failed");
                false
            }
            Err(_) => {
                warn!(key = %key, "existence check timed out");
                false
            }
        }
    }

    /// Server-side copy; `false` on any failure.
    pub async fn copy(&self, src: &BlobKey, dst: &BlobKey) -> bool {
        self.executor.copy(src, dst).await
    }

    /// Delete a key; `false` on any failure.
    pub async fn delete(&self, key: &BlobKey) -> bool {
        self.executor.delete(key).await
    }

    /// Contents of `key`, or `None` if it cannot be fetched.
    pub async fn get_contents(&self, key: &BlobKey) -> Option<Bytes> {
        match self.fetch(key).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to fetch contents");
                None
            }
        }
    }

    /// Fetch `key` and parse it as JSON.
    pub async fn try_get_json<T: DeserializeOwned>(&self, key: &BlobKey) -> Result<T, SyncError> {
        let data = self.fetch(key).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Fetch `key` as JSON, falling back to `T::default()` on any failure.
    pub async fn get_json<T: DeserializeOwned + Default>(&self, key: &BlobKey) -> T {
        match self.try_get_json(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to fetch JSON");
                T::default()
            }
        }
    }

    /// Every key under `prefix`, optionally restricted to those ending in
    /// `suffix`. The suffix filter runs client side.
    pub async fn list_objects(
        &self,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<Vec<BlobKey>, SyncError> {
        let policy = self.executor.policy();
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let store = &self.store;
            let page = policy
                .run("list", || store.list(prefix, None, token.as_ref()))
                .await
                .result?;
            keys.extend(
                page.keys
                    .into_iter()
                    .map(|listed| listed.key)
                    .filter(|key| suffix.map_or(true, |s| key.ends_with(s))),
            );
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }

    /// Download a single key to `local_path`.
    pub async fn download_file(&self, key: BlobKey, local_path: PathBuf) -> TransferResult {
        self.executor
            .execute(TransferTask {
                direction: Direction::Download,
                key,
                local_path,
                size_hint: None,
            })
            .await
    }

    /// Upload a single file to `key`.
    pub async fn upload_file(&self, local_path: PathBuf, key: BlobKey) -> TransferResult {
        self.executor
            .execute(TransferTask {
                direction: Direction::Upload,
                key,
                local_path,
                size_hint: None,
            })
            .await
    }

    async fn fetch(&self, key: &BlobKey) -> Result<Bytes, SyncError> {
        let store = &self.store;
        Ok(self
            .executor
            .policy()
            .run("get", || store.get(key))
            .await
            .result?)
    }
}
