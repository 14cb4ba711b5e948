//! Command handlers.
//!
//! Each handler is a thin wrapper: build the engine or tokenizer from the
//! parsed arguments, run it, and format the result for the terminal.

pub mod serve;
pub mod tokenize;

use anyhow::Result;

use crate::commands::Commands;

/// Run one parsed command to completion.
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::ServeSplit { port, mode } => serve::execute(port, mode).await,
        Commands::Tokenize {
            port,
            dir,
            texts,
            command,
        } => tokenize::execute(port, dir, &texts, &command).await,
    }
}
