use std::path::PathBuf;

use clap::Args;
use object_store::ObjectStoreConfig;

use crate::state::{AppConfig, AppState, OBJECTS_DIR_NAME};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Keep objects in this local directory (default: <config dir>/objects)
    #[arg(long, conflicts_with = "bucket")]
    pub local_path: Option<PathBuf>,

    /// S3 bucket to mirror against
    #[arg(long, requires_all = ["endpoint", "access_key", "secret_key"])]
    pub bucket: Option<String>,

    /// S3 endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub access_key: Option<String>,

    #[arg(long)]
    pub secret_key: Option<String>,

    #[arg(long)]
    pub region: Option<String>,
}

impl Init {
    fn store_config(&self, app_dir: PathBuf) -> ObjectStoreConfig {
        match (&self.bucket, &self.local_path) {
            (Some(bucket), _) => ObjectStoreConfig::S3 {
                endpoint: self.endpoint.clone().unwrap_or_default(),
                access_key: self.access_key.clone().unwrap_or_default(),
                secret_key: self.secret_key.clone().unwrap_or_default(),
                bucket: bucket.clone(),
                region: self.region.clone(),
            },
            (None, Some(path)) => ObjectStoreConfig::Local { path: path.clone() },
            (None, None) => ObjectStoreConfig::Local {
                path: app_dir.join(OBJECTS_DIR_NAME),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let app_dir = AppState::app_dir(ctx.config_path.clone())?;
        let mut config = AppConfig::local(app_dir.join(OBJECTS_DIR_NAME));
        config.store.backend = self.store_config(app_dir);

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let store = match &state.config.store.backend {
            ObjectStoreConfig::Memory => "memory".to_string(),
            ObjectStoreConfig::Local { path } => format!("local ({})", path.display()),
            ObjectStoreConfig::S3 {
                endpoint, bucket, ..
            } => format!("s3 ({}/{})", endpoint, bucket),
        };

        Ok(format!(
            "Initialized blobsync directory at: {}\n\
             - Config: {}\n\
             - Store: {}\n\
             - Workers: {}",
            state.app_dir.display(),
            state.config_path.display(),
            store,
            state.config.sync.worker_pool_size,
        ))
    }
}
