use std::fmt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use common::prelude::{cancellation, Direction, SyncError, SyncReport};

use crate::op::ContextError;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    /// Remote prefix into the local directory
    Download,
    /// Local directory under the remote prefix
    Upload,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Download => Direction::Download,
            DirectionArg::Upload => Direction::Upload,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Mirror {
    #[arg(long, value_enum)]
    pub direction: DirectionArg,

    /// Remote key prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Local directory to mirror into or out of
    #[arg(long)]
    pub local_root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("mirror failed: {0}")]
    Sync(#[from] SyncError),
}

#[derive(Debug)]
pub struct MirrorOutput {
    pub direction: Direction,
    pub report: SyncReport,
}

impl fmt::Display for MirrorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.direction, self.report)?;
        for result in &self.report.failed {
            if let Some(reason) = result.failure() {
                write!(f, "\n  failed {}: {}", result.task.key, reason)?;
            }
        }
        for error in &self.report.planning_errors {
            write!(f, "\n  skipped {}: {}", error.location, error.reason)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Mirror {
    type Error = MirrorError;
    type Output = MirrorOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;
        let direction = Direction::from(self.direction);

        // Ctrl-C stops dispatch; in-flight transfers finish.
        let (handle, token) = cancellation();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling remaining transfers");
                handle.cancel();
            }
        });

        let result = engine
            .mirror(direction, &self.prefix, &self.local_root, &token)
            .await;
        interrupt.abort();

        Ok(MirrorOutput {
            direction,
            report: result?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::prelude::{
        BlobKey, FailureReason, PlanningError, TransferResult, TransferTask,
    };

    fn task(key: &str) -> TransferTask {
        TransferTask {
            direction: Direction::Download,
            key: BlobKey::new(key).unwrap(),
            local_path: PathBuf::from("/tmp").join(key),
            size_hint: None,
        }
    }

    #[test]
    fn test_output_lists_failures_and_skips() {
        let mut report = SyncReport::default();
        report.record(TransferResult::success(task("a"), 3, 0));
        report.record(TransferResult::failed(
            task("b"),
            FailureReason::MissingRemote,
            0,
        ));
        report.planning_errors.push(PlanningError {
            location: "c/".to_string(),
            reason: "listing failed".to_string(),
        });

        let output = MirrorOutput {
            direction: Direction::Download,
            report,
        }
        .to_string();

        assert!(output.contains("failed b: missing-remote"));
        assert!(output.contains("skipped c/: listing failed"));
    }
}
