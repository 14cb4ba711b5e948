//! Subcommands of the `tokbridge` binary.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use tokbridge_core::DEFAULT_PORT;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a tokenizer server backed by a demo split engine
    ///
    /// Stops on a `stop` line (or end of input) on stdin.
    ServeSplit {
        /// Port to listen on (127.0.0.1 only)
        #[arg(short, long, env = "TOKBRIDGE_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Shape of the `tokens` payload
        #[arg(short, long, value_enum, default_value_t = SplitMode::Tokens)]
        mode: SplitMode,
    },

    /// Launch a tokenizer server command and tokenize texts with it
    Tokenize {
        /// Port the launched server listens on
        #[arg(short, long, env = "TOKBRIDGE_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Working directory for the server command
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Text to tokenize; repeat for several
        #[arg(short, long = "text", required = true)]
        texts: Vec<String>,
        /// Server command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Which demo engine `serve-split` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitMode {
    /// `["my", "example"]`
    Words,
    /// `Token` objects with offsets
    Tokens,
}
