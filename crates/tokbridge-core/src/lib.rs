#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod protocol;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::{PartOfSpeech, Token, TokenSpanError};
pub use ports::{
    EngineError, ExclusiveEngine, Serialized, SupervisorError, Tokenizer, TokenizerEngine,
    TokenizerError,
};
pub use protocol::{
    DEFAULT_PORT, HEALTHZ_PATH, READINESS_TOKEN, STOP_KEYWORD, TOKENIZE_PATH, TokenizeRequest,
    TokenizeResponse, first_line,
};
pub use services::{SplitTokenizer, TokenizedText, tokenize_texts};
