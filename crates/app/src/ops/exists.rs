use clap::Args;
use object_store::BlobKey;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Exists {
    #[arg(long)]
    pub key: BlobKey,
}

#[async_trait::async_trait]
impl crate::op::Op for Exists {
    type Error = ContextError;
    type Output = bool;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;
        Ok(engine.exists(&self.key).await)
    }
}
