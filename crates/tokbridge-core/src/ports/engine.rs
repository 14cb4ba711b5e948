//! Tokenizer engine capability run inside a tokenizer server.
//!
//! The server treats engine output as opaque serializable data. How an engine
//! is bound (static linkage, dynamic loading, a JVM) stays behind this trait.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use super::EngineError;

/// A thread-safe tokenizer engine.
///
/// Requests are dispatched to the engine concurrently. Engines that cannot be
/// shared across threads implement [`ExclusiveEngine`] and are wrapped in
/// [`Serialized`].
pub trait TokenizerEngine: Send + Sync + 'static {
    /// Engine specific token payload, encoded as the `tokens` field.
    type Output: Serialize + Send + 'static;

    /// Tokenize `text`.
    fn tokenize(&self, text: &str) -> Result<Self::Output, EngineError>;

    /// Release engine resources. Called at most once per server lifetime,
    /// after the listener has drained.
    fn cleanup(&self);
}

/// A tokenizer engine that must not be called concurrently.
pub trait ExclusiveEngine: Send + 'static {
    type Output: Serialize + Send + 'static;

    fn tokenize(&mut self, text: &str) -> Result<Self::Output, EngineError>;

    fn cleanup(&mut self);
}

/// Single-flight adapter for an [`ExclusiveEngine`].
///
/// Concurrent requests queue on a mutex so only one call reaches the engine
/// at a time.
#[derive(Debug)]
pub struct Serialized<E> {
    inner: Mutex<E>,
}

impl<E> Serialized<E> {
    pub const fn new(engine: E) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    /// Unwrap the engine, ignoring poisoning.
    pub fn into_inner(self) -> E {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: ExclusiveEngine> TokenizerEngine for Serialized<E> {
    type Output = E::Output;

    fn tokenize(&self, text: &str) -> Result<Self::Output, EngineError> {
        let mut engine = self.inner.lock().map_err(|_| EngineError::Poisoned)?;
        engine.tokenize(text)
    }

    fn cleanup(&self) {
        // Cleanup must still run after a panicking request.
        let mut engine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        engine.cleanup();
    }
}
