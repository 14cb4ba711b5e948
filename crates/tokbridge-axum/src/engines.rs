//! Demo engines that split on spaces.
//!
//! Both count `cleanup` calls so tests can assert the exactly-once cleanup
//! guarantee from outside the server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokbridge_core::{EngineError, SplitTokenizer, Token, TokenizerEngine};
use tracing::info;

/// Returns the space separated words as plain strings.
#[derive(Debug, Clone, Default)]
pub struct SplitWordsEngine {
    cleanups: Arc<AtomicUsize>,
}

impl SplitWordsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `cleanup` calls so far, shared with every clone.
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl TokenizerEngine for SplitWordsEngine {
    type Output = Vec<String>;

    fn tokenize(&self, text: &str) -> Result<Self::Output, EngineError> {
        Ok(text
            .split(' ')
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn cleanup(&self) {
        let count = self.cleanups.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "split words engine cleaned up");
    }
}

/// Returns [`Token`]s tagged as nouns with character offsets.
#[derive(Debug, Clone, Default)]
pub struct SplitTokensEngine {
    cleanups: Arc<AtomicUsize>,
}

impl SplitTokensEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl TokenizerEngine for SplitTokensEngine {
    type Output = Vec<Token>;

    fn tokenize(&self, text: &str) -> Result<Self::Output, EngineError> {
        Ok(SplitTokenizer::split(text))
    }

    fn cleanup(&self) {
        let count = self.cleanups.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "split tokens engine cleaned up");
    }
}
