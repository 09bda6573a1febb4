use clap::Args;
use common::prelude::SyncError;
use object_store::BlobKey;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    #[arg(long)]
    pub key: BlobKey,

    /// Parse the object as JSON and pretty print it
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("no such key: {0}")]
    NotFound(BlobKey),
    #[error("{0}")]
    Sync(#[from] SyncError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;

        if self.json {
            let value: serde_json::Value = match engine.try_get_json(&self.key).await {
                Ok(value) => value,
                Err(SyncError::Store(e)) if e.is_not_found() => {
                    return Err(CatError::NotFound(self.key.clone()))
                }
                Err(e) => return Err(e.into()),
            };
            return Ok(serde_json::to_string_pretty(&value)?);
        }

        let contents = engine
            .get_contents(&self.key)
            .await
            .ok_or_else(|| CatError::NotFound(self.key.clone()))?;
        Ok(String::from_utf8_lossy(&contents).into_owned())
    }
}
