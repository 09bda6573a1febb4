/**
 * Cancellation signal shared between a mirror
 *  call and its workers.
 */
pub mod cancel;
pub mod config;
/**
 * The mirror engine: planner feeding a bounded
 *  worker pool, results folded into a report.
 */
pub mod engine;
pub mod error;
pub mod executor;
/**
 * Pure mapping between remote keys and local
 *  paths, plus parent directory creation.
 */
pub mod path_mapper;
/**
 * Lazy, worklist driven enumeration of remote
 *  prefixes and local trees into transfer tasks.
 */
pub mod planner;
pub mod report;
pub mod retry;

pub mod prelude {
    pub use crate::cancel::{cancellation, CancelHandle, CancelToken};
    pub use crate::config::SyncConfig;
    pub use crate::engine::SyncEngine;
    pub use crate::error::SyncError;
    pub use crate::executor::TransferExecutor;
    pub use crate::planner::{PlanStep, SyncPlanner, TaskSource};
    pub use crate::report::{
        Direction, FailureReason, Outcome, PlanningError, SyncReport, TransferResult,
        TransferTask,
    };
    pub use crate::retry::RetryPolicy;
    pub use object_store::{BlobKey, BlobStore, ObjectStoreBackend, ObjectStoreConfig};
}
