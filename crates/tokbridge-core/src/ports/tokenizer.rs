//! Application facing tokenizer port.

use async_trait::async_trait;

use super::TokenizerError;
use crate::domain::Token;

/// Takes a string and returns its part of speech tokens.
///
/// Implementations may tokenize in-process or delegate to a supervised
/// tokenizer server; callers cannot tell the difference.
///
/// # Lifecycle
///
/// `setup` must succeed before `tokenize`. Calling `tokenize` on a tokenizer
/// that is not set up fails with [`TokenizerError::NotSetup`] and performs no
/// I/O.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Acquire resources (for server tokenizers: launch and wait for readiness).
    async fn setup(&self) -> Result<(), TokenizerError>;

    /// Whether `tokenize` can currently be called.
    async fn is_setup(&self) -> bool;

    /// Tokenize `text`.
    async fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizerError>;

    /// Release resources without waiting for them to be gone.
    async fn cleanup(&self) -> Result<(), TokenizerError>;

    /// Release resources and wait, within a grace period, until they are gone.
    ///
    /// Exceeding the grace period is logged, not returned as an error.
    async fn cleanup_and_wait(&self) -> Result<(), TokenizerError>;
}
