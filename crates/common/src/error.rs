//! Error types for sync operations.

use std::path::PathBuf;

use object_store::StoreError;

/// Errors that abort a whole operation.
///
/// Failures of individual transfers never surface here; they are recorded in
/// the [`crate::report::SyncReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The initial listing or directory walk could not start
    #[error("setup failed for {location}: {reason}")]
    Setup { location: String, reason: String },

    #[error("path {} is not under {}", path.display(), root.display())]
    InvalidPath { path: PathBuf, root: PathBuf },

    #[error("invalid key path {key:?}: {reason}")]
    InvalidKeyPath { key: String, reason: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn setup(location: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::Setup {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}
