use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::retry::RetryPolicy;

/// Tuning knobs for a sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of concurrent transfer workers
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// `max-age` written into the cache-control of uploaded objects
    #[serde(default = "default_cache_lifetime_seconds")]
    pub cache_lifetime_seconds: u64,
    /// Total attempts per transfer, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_cache_lifetime_seconds() -> u64 {
    600
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            cache_lifetime_seconds: default_cache_lifetime_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.worker_pool_size == 0 {
            return Err(SyncError::InvalidConfig(
                "worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }

    pub fn cache_control(&self) -> String {
        format!("max-age={}", self.cache_lifetime_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.cache_control(), "max-age=600");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"retry_attempts": 5}"#).unwrap();
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_rejects_empty_pool() {
        let config = SyncConfig {
            worker_pool_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));
    }
}
