//! Domain types.

mod token;

pub use token::{PartOfSpeech, Token, TokenSpanError};
