//! Tokenizer services that need no process or network access.

mod split;
mod texts;

pub use split::SplitTokenizer;
pub use texts::{TokenizedText, tokenize_texts};
