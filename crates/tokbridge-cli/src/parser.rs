//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Serve or call out-of-process tokenizers.
#[derive(Parser)]
#[command(name = "tokbridge")]
#[command(about = "Serve and call out-of-process tokenizer servers")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
