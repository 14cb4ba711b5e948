//! In-process whitespace tokenizer.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::{PartOfSpeech, Token};
use crate::ports::{Tokenizer, TokenizerError};

/// Splits text on single spaces and tags every piece as a noun.
///
/// Used for tests and mocks where a real engine is unavailable.
#[derive(Debug, Default)]
pub struct SplitTokenizer {
    setup: AtomicBool,
}

impl SplitTokenizer {
    pub const fn new() -> Self {
        Self {
            setup: AtomicBool::new(false),
        }
    }

    /// The split itself, without lifecycle checks.
    ///
    /// Empty pieces between consecutive spaces are dropped; offsets are in
    /// characters.
    pub fn split(text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut index = 0;
        for piece in text.split(' ') {
            let len = piece.chars().count();
            if len > 0 {
                tokens.push(Token::new(piece, PartOfSpeech::Noun, index, index + len));
            }
            index += len + 1;
        }
        tokens
    }
}

#[async_trait]
impl Tokenizer for SplitTokenizer {
    async fn setup(&self) -> Result<(), TokenizerError> {
        self.setup.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_setup(&self) -> bool {
        self.setup.load(Ordering::SeqCst)
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizerError> {
        if !self.setup.load(Ordering::SeqCst) {
            return Err(TokenizerError::NotSetup);
        }
        Ok(Self::split(text))
    }

    async fn cleanup(&self) -> Result<(), TokenizerError> {
        self.setup.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup_and_wait(&self) -> Result<(), TokenizerError> {
        self.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tracks_character_offsets() {
        let input = "대한민국은 민주공화국이다.";
        let tokens = SplitTokenizer::split(input);
        assert_eq!(
            tokens,
            vec![
                Token::new("대한민국은", PartOfSpeech::Noun, 0, 5),
                Token::new("민주공화국이다.", PartOfSpeech::Noun, 6, 14),
            ]
        );
        for token in &tokens {
            token.check_span(input).unwrap();
            assert_eq!(token.slice(input), Some(token.text.as_str()));
        }
    }

    #[test]
    fn split_skips_empty_pieces() {
        let tokens = SplitTokenizer::split(" a  b ");
        assert_eq!(
            tokens,
            vec![
                Token::new("a", PartOfSpeech::Noun, 1, 2),
                Token::new("b", PartOfSpeech::Noun, 4, 5),
            ]
        );
        assert!(SplitTokenizer::split("").is_empty());
    }

    #[tokio::test]
    async fn tokenize_requires_setup() {
        let tokenizer = SplitTokenizer::new();
        let err = tokenizer.tokenize("my example").await.unwrap_err();
        assert!(err.is_not_setup());

        tokenizer.setup().await.unwrap();
        assert!(tokenizer.is_setup().await);
        assert_eq!(tokenizer.tokenize("my example").await.unwrap().len(), 2);

        tokenizer.cleanup_and_wait().await.unwrap();
        assert!(!tokenizer.is_setup().await);
        assert!(tokenizer.tokenize("my example").await.unwrap_err().is_not_setup());
    }
}
