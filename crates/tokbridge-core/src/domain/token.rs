//! Part of speech tokens produced by tokenizers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grammatical category of a token.
///
/// Engines report their own tag sets; adapters map those tags onto this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartOfSpeech {
    Noun,
    Pronoun,
    Numeral,
    Postposition,
    Verb,
    Adjective,
    Determiner,
    Adverb,
    Interjection,
    Prefix,
    Suffix,
    DependentNoun,
    AuxiliaryPredicate,
    Ending,
    Copula,
    Punctuation,
    OtherLanguage,
    Root,
    Unknown,
}

/// A token of the original input.
///
/// `start_index..end_index` is a half-open range of character (not byte)
/// offsets into the input that was tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub text: String,
    pub part_of_speech: PartOfSpeech,
    pub start_index: usize,
    pub end_index: usize,
}

/// A token whose span does not fit the input it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token {text:?} has span {start}..{end}, input has {len} characters")]
pub struct TokenSpanError {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub len: usize,
}

impl Token {
    pub fn new(
        text: impl Into<String>,
        part_of_speech: PartOfSpeech,
        start_index: usize,
        end_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            part_of_speech,
            start_index,
            end_index,
        }
    }

    /// Number of characters covered by the token.
    pub const fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks `0 <= start_index < end_index <= input.chars().count()`.
    ///
    /// Tokenizer servers do not enforce this themselves; engine adapters and
    /// their test suites do.
    pub fn check_span(&self, input: &str) -> Result<(), TokenSpanError> {
        let len = input.chars().count();
        if self.start_index < self.end_index && self.end_index <= len {
            return Ok(());
        }
        Err(TokenSpanError {
            text: self.text.clone(),
            start: self.start_index,
            end: self.end_index,
            len,
        })
    }

    /// The slice of `input` covered by the span, if the span is valid.
    pub fn slice<'a>(&self, input: &'a str) -> Option<&'a str> {
        self.check_span(input).ok()?;
        let mut indices = input.char_indices().map(|(i, _)| i).chain([input.len()]);
        let start = indices.nth(self.start_index)?;
        let end = indices.nth(self.len() - 1)?;
        input.get(start..end)
    }
}
