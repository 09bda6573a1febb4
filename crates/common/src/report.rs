//! Transfer tasks, their outcomes and the per-mirror report.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use object_store::BlobKey;
use serde::{Deserialize, Serialize};

/// Which way bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Remote store to local tree
    Download,
    /// Local tree to remote store
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("download"),
            Direction::Upload => f.write_str("upload"),
        }
    }
}

/// A single planned transfer. Consumed exactly once by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub direction: Direction,
    pub key: BlobKey,
    pub local_path: PathBuf,
    pub size_hint: Option<u64>,
}

/// Why a transfer did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The remote key does not exist
    MissingRemote,
    /// The task was never started because the mirror was cancelled
    Cancelled,
    /// Retries were exhausted on a transient failure
    Transient(String),
    /// The store rejected the operation
    Permanent(String),
    /// Reading or writing the local file failed
    Local(String),
    /// The key cannot be mapped into the local root
    InvalidPath(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingRemote => f.write_str("missing-remote"),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Transient(e) => write!(f, "transient: {}", e),
            FailureReason::Permanent(e) => write!(f, "permanent: {}", e),
            FailureReason::Local(e) => write!(f, "local: {}", e),
            FailureReason::InvalidPath(e) => write!(f, "invalid-path: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(FailureReason),
}

/// Outcome of executing one [`TransferTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub task: TransferTask,
    pub outcome: Outcome,
    pub bytes_transferred: u64,
    /// Attempts made after the first one
    pub retries: u32,
}

impl TransferResult {
    pub fn success(task: TransferTask, bytes_transferred: u64, retries: u32) -> Self {
        Self {
            task,
            outcome: Outcome::Success,
            bytes_transferred,
            retries,
        }
    }

    pub fn failed(task: TransferTask, reason: FailureReason, retries: u32) -> Self {
        Self {
            task,
            outcome: Outcome::Failed(reason),
            bytes_transferred: 0,
            retries,
        }
    }

    pub fn cancelled(task: TransferTask) -> Self {
        Self::failed(task, FailureReason::Cancelled, 0)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failed(reason) => Some(reason),
        }
    }
}

/// A part of the tree that could not be enumerated once planning was under way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningError {
    /// Key prefix or local directory
    pub location: String,
    pub reason: String,
}

/// Everything that happened during one mirror call, in completion order.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub succeeded: Vec<TransferResult>,
    pub failed: Vec<TransferResult>,
    pub planning_errors: Vec<PlanningError>,
}

impl SyncReport {
    pub fn record(&mut self, result: TransferResult) {
        if result.is_success() {
            self.succeeded.push(result);
        } else {
            self.failed.push(result);
        }
    }

    pub fn succeeded_keys(&self) -> BTreeSet<BlobKey> {
        self.succeeded.iter().map(|r| r.task.key.clone()).collect()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.succeeded.iter().map(|r| r.bytes_transferred).sum()
    }

    /// Failed results that were never started.
    pub fn cancelled(&self) -> impl Iterator<Item = &TransferResult> {
        self.failed
            .iter()
            .filter(|r| r.failure() == Some(&FailureReason::Cancelled))
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// No failed transfers and the whole tree was enumerated.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.planning_errors.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded ({} bytes), {} failed",
            self.succeeded.len(),
            self.bytes_transferred(),
            self.failed.len()
        )?;
        if !self.planning_errors.is_empty() {
            write!(f, ", {} unlisted locations", self.planning_errors.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(key: &str) -> TransferTask {
        TransferTask {
            direction: Direction::Download,
            key: BlobKey::new(key).unwrap(),
            local_path: PathBuf::from(key),
            size_hint: None,
        }
    }

    #[test]
    fn test_record_partitions_results() {
        let mut report = SyncReport::default();
        report.record(TransferResult::success(task("a"), 10, 0));
        report.record(TransferResult::failed(
            task("b"),
            FailureReason::MissingRemote,
            0,
        ));
        report.record(TransferResult::cancelled(task("c")));

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.cancelled().count(), 1);
        assert_eq!(report.bytes_transferred(), 10);
        assert!(!report.is_clean());
        assert_eq!(report.to_string(), "1 succeeded (10 bytes), 2 failed");
    }

    #[test]
    fn test_failure_reason_rendering() {
        assert_eq!(FailureReason::MissingRemote.to_string(), "missing-remote");
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
    }
}
