use clap::Args;
use object_store::BlobKey;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Delete {
    #[arg(long)]
    pub key: BlobKey,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("delete {0} failed")]
    Failed(BlobKey),
}

#[async_trait::async_trait]
impl crate::op::Op for Delete {
    type Error = DeleteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;
        if !engine.delete(&self.key).await {
            return Err(DeleteError::Failed(self.key.clone()));
        }
        Ok(format!("deleted {}", self.key))
    }
}
