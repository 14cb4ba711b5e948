//! Port definitions and their error types.
//!
//! Two capabilities cross process boundaries in tokbridge:
//!
//! - [`TokenizerEngine`] runs inside a tokenizer server process and does the
//!   actual tokenization
//! - [`Tokenizer`] is what application code calls, regardless of whether the
//!   engine lives in-process or behind a supervised subprocess

mod engine;
mod tokenizer;

use std::time::Duration;

use thiserror::Error;

pub use engine::{ExclusiveEngine, Serialized, TokenizerEngine};
pub use tokenizer::Tokenizer;

/// Errors raised by a [`TokenizerEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected or failed on the input.
    #[error("{0}")]
    Failed(String),

    /// A previous call panicked while holding the engine.
    #[error("tokenizer engine is poisoned by an earlier panic")]
    Poisoned,
}

impl EngineError {
    /// Create a `Failed` error from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Errors from supervising a tokenizer server process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start` was called on a supervisor that already left `NotStarted`.
    #[error("tokenizer server was already started; construct a new one to restart")]
    AlreadyStarted,

    /// An operation that needs a started process was called before `start`.
    #[error("tokenizer server was never started")]
    NotStarted,

    /// The executable could not be spawned or its stdin could not be piped.
    #[error("failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    /// The health check never succeeded within the polling budget.
    #[error("timed out waiting for {path} after {attempts} attempts")]
    ReadinessTimeout { path: String, attempts: u32 },

    /// The process exited before the health check succeeded.
    #[error("tokenizer server exited during startup")]
    ExitedDuringStartup,

    /// Connection refused, reset or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("tokenizer server returned [{status}]: {body}")]
    Status { status: u16, body: String },

    /// The server answered 200 with a body that does not decode.
    #[error("failed to decode tokenizer response: {message}")]
    Decode { message: String, body: String },

    /// The stop keyword could not be written to the process stdin.
    #[error("tokenizer server stdin is closed: {0}")]
    StdinClosed(String),

    /// The process did not exit within the grace period.
    #[error("tokenizer server still running {0:?} after stop")]
    StillRunning(Duration),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Errors surfaced by the application facing [`Tokenizer`] port.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// `tokenize` was called before `setup` succeeded or after `cleanup`.
    #[error("tokenizer is not setup")]
    NotSetup,

    #[error(transparent)]
    Server(#[from] SupervisorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The engine payload decoded but does not describe valid tokens.
    #[error("invalid tokenizer response: {0}")]
    InvalidResponse(String),
}

impl TokenizerError {
    /// True for the distinct not-setup condition.
    pub const fn is_not_setup(&self) -> bool {
        matches!(self, Self::NotSetup)
    }
}
