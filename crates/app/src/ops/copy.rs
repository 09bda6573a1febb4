use clap::Args;
use object_store::BlobKey;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct CopyObject {
    /// Source key
    #[arg(long)]
    pub from: BlobKey,

    /// Destination key, overwritten if present
    #[arg(long)]
    pub to: BlobKey,
}

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("copy {0} -> {1} failed")]
    Failed(BlobKey, BlobKey),
}

#[async_trait::async_trait]
impl crate::op::Op for CopyObject {
    type Error = CopyError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;
        if !engine.copy(&self.from, &self.to).await {
            return Err(CopyError::Failed(self.from.clone(), self.to.clone()));
        }
        Ok(format!("copied {} -> {}", self.from, self.to))
    }
}
