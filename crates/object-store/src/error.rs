//! Error types for the blob store capability.

/// Errors that can occur when talking to a blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key does not exist. Definitive, never worth retrying.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Network, timeout or server-side failure that may succeed on retry
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Any other failure reported by the backend
    #[error("storage error: {0}")]
    Permanent(String),

    /// Key failed validation
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before syncing.")]
    BucketNotFound(String),
}

impl StoreError {
    /// Whether the failure is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StoreError::NotFound(path),
            // HTTP clients surface connection resets, timeouts and 5xx as Generic
            e @ object_store::Error::Generic { .. } => StoreError::Transient(e.to_string()),
            e @ object_store::Error::JoinError { .. } => StoreError::Transient(e.to_string()),
            e => StoreError::Permanent(e.to_string()),
        }
    }
}

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
