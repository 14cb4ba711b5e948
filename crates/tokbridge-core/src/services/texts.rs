//! Batch tokenization with a scoped tokenizer lifecycle.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::Token;
use crate::ports::{Tokenizer, TokenizerError};

/// A text paired with its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenizedText {
    pub text: String,
    pub tokens: Vec<Token>,
}

/// Set up `tokenizer`, tokenize every text, then clean up and wait.
///
/// Cleanup always runs. If tokenizing failed, that error is returned and a
/// cleanup error is only logged; otherwise a cleanup error is returned.
pub async fn tokenize_texts<T, S>(
    tokenizer: &T,
    texts: &[S],
) -> Result<Vec<TokenizedText>, TokenizerError>
where
    T: Tokenizer + ?Sized,
    S: AsRef<str> + Sync,
{
    tokenizer.setup().await?;
    debug!(count = texts.len(), "Tokenizing texts");

    let result = tokenize_all(tokenizer, texts).await;
    let cleanup = tokenizer.cleanup_and_wait().await;

    match (result, cleanup) {
        (Ok(tokenized), Ok(())) => Ok(tokenized),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "Cleanup failed after tokenize error");
            Err(e)
        }
    }
}

async fn tokenize_all<T, S>(tokenizer: &T, texts: &[S]) -> Result<Vec<TokenizedText>, TokenizerError>
where
    T: Tokenizer + ?Sized,
    S: AsRef<str> + Sync,
{
    let mut tokenized = Vec::with_capacity(texts.len());
    for text in texts {
        let text = text.as_ref();
        let tokens = tokenizer.tokenize(text).await?;
        tokenized.push(TokenizedText {
            text: text.to_string(),
            tokens,
        });
    }
    Ok(tokenized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PartOfSpeech;
    use crate::ports::{EngineError, SupervisorError};
    use crate::services::SplitTokenizer;
    use async_trait::async_trait;
    use mockall::{Sequence, mock};

    mock! {
        pub Tok {}

        #[async_trait]
        impl Tokenizer for Tok {
            async fn setup(&self) -> Result<(), TokenizerError>;
            async fn is_setup(&self) -> bool;
            async fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizerError>;
            async fn cleanup(&self) -> Result<(), TokenizerError>;
            async fn cleanup_and_wait(&self) -> Result<(), TokenizerError>;
        }
    }

    #[tokio::test]
    async fn tokenizes_each_text_in_order() {
        let tokenizer = SplitTokenizer::new();
        let result = tokenize_texts(&tokenizer, &["my example", "two"]).await;
        let tokenized = tokio_test::assert_ok!(result);

        assert_eq!(tokenized.len(), 2);
        assert_eq!(tokenized[0].text, "my example");
        assert_eq!(
            tokenized[1].tokens,
            vec![Token::new("two", PartOfSpeech::Noun, 0, 3)]
        );
        assert!(!tokenizer.is_setup().await);
    }

    #[tokio::test]
    async fn setup_failure_skips_cleanup() {
        let mut tokenizer = MockTok::new();
        tokenizer
            .expect_setup()
            .times(1)
            .returning(|| Err(SupervisorError::ExitedDuringStartup.into()));
        tokenizer.expect_tokenize().never();
        tokenizer.expect_cleanup_and_wait().never();

        let err = tokenize_texts(&tokenizer, &["a"]).await.unwrap_err();
        assert!(matches!(
            err,
            TokenizerError::Server(SupervisorError::ExitedDuringStartup)
        ));
    }

    #[tokio::test]
    async fn tokenize_error_wins_over_cleanup_error() {
        let mut seq = Sequence::new();
        let mut tokenizer = MockTok::new();
        tokenizer
            .expect_setup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        tokenizer
            .expect_tokenize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(EngineError::failed("engine down").into()));
        tokenizer
            .expect_cleanup_and_wait()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(TokenizerError::NotSetup));

        let err = tokenize_texts(&tokenizer, &["a", "b"]).await.unwrap_err();
        assert_eq!(err.to_string(), "engine down");
    }

    #[tokio::test]
    async fn cleanup_error_is_returned_after_success() {
        let mut tokenizer = MockTok::new();
        tokenizer.expect_setup().returning(|| Ok(()));
        tokenizer.expect_tokenize().returning(|_| Ok(Vec::new()));
        tokenizer
            .expect_cleanup_and_wait()
            .times(1)
            .returning(|| Err(SupervisorError::StillRunning(std::time::Duration::from_secs(1)).into()));

        let err = tokenize_texts(&tokenizer, &["a"]).await.unwrap_err();
        assert!(matches!(
            err,
            TokenizerError::Server(SupervisorError::StillRunning(_))
        ));
    }
}
