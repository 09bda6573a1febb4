use clap::Args;
use common::prelude::SyncError;

use crate::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Only keys starting with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Only keys ending with this suffix
    #[arg(long)]
    pub suffix: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("listing failed: {0}")]
    Sync(#[from] SyncError),
}

#[async_trait::async_trait]
impl crate::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let engine = ctx.engine().await?;
        let keys = engine
            .list_objects(&self.prefix, self.suffix.as_deref())
            .await?;

        Ok(keys
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
