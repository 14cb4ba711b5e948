#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod command;
pub mod config;
mod health;
pub mod process;
mod tokenizer;

pub use command::CmdOptions;
pub use config::{ConfigError, HealthPolicy, TokenizerConfig};
pub use health::{check_health, wait_for_health};
pub use process::{CmdTokenizerServer, ServerPhase, shutdown_child};
pub use tokenizer::{ServerTokenizer, TokenAdapter, TokenListAdapter};
