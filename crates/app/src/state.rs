use std::{fs, path::PathBuf};

use common::config::SyncConfig;
use object_store::{ObjectStoreConfig, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "blobsync";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const OBJECTS_DIR_NAME: &str = "objects";

/// The `[store]` table: which backend to talk to and how to page listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(flatten)]
    pub backend: ObjectStoreConfig,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for log files (logs to stderr only if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub store: StoreSection,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Local filesystem store rooted at `objects_path`, default tuning.
    pub fn local(objects_path: PathBuf) -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            store: StoreSection {
                backend: ObjectStoreConfig::Local {
                    path: objects_path,
                },
                page_size: default_page_size(),
            },
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the blobsync directory (~/.blobsync)
    pub app_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the blobsync directory path (custom or default ~/.blobsync)
    pub fn app_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory.
    ///
    /// Without an explicit config, objects are kept on the local filesystem
    /// under `<dir>/objects`.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom_path)?;
        let config_path = app_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&app_dir)?;

        let config = config.unwrap_or_else(|| AppConfig::local(app_dir.join(OBJECTS_DIR_NAME)));
        if let ObjectStoreConfig::Local { path } = &config.store.backend {
            fs::create_dir_all(path)?;
        }

        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            app_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the blobsync directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom_path)?;

        if !app_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = app_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            app_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no home directory found")]
    NoHomeDirectory,
    #[error("blobsync directory already initialized")]
    AlreadyInitialized,
    #[error("blobsync directory not initialized, run `blobsync init` first")]
    NotInitialized,
    #[error("missing required file: {0}")]
    MissingFile(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("state");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(state.config_path.exists());
        assert!(dir.join(OBJECTS_DIR_NAME).is_dir());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, state.config);

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().join("nope"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_parse_s3_config_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [store]
            type = "s3"
            endpoint = "http://localhost:9000"
            access_key = "minio"
            secret_key = "minio123"
            bucket = "site"

            [sync]
            worker_pool_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.store.page_size, DEFAULT_PAGE_SIZE);
        assert!(matches!(
            config.store.backend,
            ObjectStoreConfig::S3 { ref bucket, region: None, .. } if bucket == "site"
        ));
        assert_eq!(config.sync.worker_pool_size, 8);
        assert_eq!(config.sync.cache_lifetime_seconds, 600);
    }
}
