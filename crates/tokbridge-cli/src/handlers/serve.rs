//! `serve-split`: the demo tokenizer server.

use anyhow::{Context, Result};
use tokbridge_axum::{SplitTokensEngine, SplitWordsEngine, run};
use tracing::info;

use crate::commands::SplitMode;

pub async fn execute(port: u16, mode: SplitMode) -> Result<()> {
    info!(port, ?mode, "Starting split tokenizer server");
    let served = match mode {
        SplitMode::Words => run(SplitWordsEngine::new(), port).await,
        SplitMode::Tokens => run(SplitTokensEngine::new(), port).await,
    };
    served.with_context(|| format!("split tokenizer server on port {port} failed"))
}
