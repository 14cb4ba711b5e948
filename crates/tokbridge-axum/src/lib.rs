#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod engines;
pub mod error;
pub mod routes;
pub mod server;

// Re-export primary types
pub use engines::{SplitTokensEngine, SplitWordsEngine};
pub use error::HttpError;
pub use routes::create_router;
pub use server::{
    BoundServer, ServeError, ServerHandle, ShutdownCoordinator, TokenizerServer, run,
    run_with_input,
};
