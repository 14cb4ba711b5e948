//! Wire protocol shared by the supervisor and the tokenizer server.
//!
//! The protocol is deliberately small:
//!
//! - `GET /healthz` answers `ok\n<timestamp>` once the server can take requests
//! - `POST /tokenize` takes a [`TokenizeRequest`] and answers a [`TokenizeResponse`]
//! - the line `stop` on the server's standard input requests graceful shutdown

use serde::{Deserialize, Serialize};

/// Health check path - GET.
pub const HEALTHZ_PATH: &str = "/healthz";

/// Tokenize path - POST.
pub const TOKENIZE_PATH: &str = "/tokenize";

/// First line of a healthy `/healthz` body.
pub const READINESS_TOKEN: &str = "ok";

/// Line written to the server's stdin to request shutdown.
pub const STOP_KEYWORD: &str = "stop";

/// Port a tokenizer server listens on when none is given.
pub const DEFAULT_PORT: u16 = 9999;

/// Body of a `/tokenize` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizeRequest {
    /// Raw input text.
    pub string: String,
}

impl TokenizeRequest {
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
        }
    }
}

/// Body of a successful `/tokenize` response.
///
/// `T` is engine specific. The server encodes whatever the engine returned and
/// the client decodes into a caller supplied shape; neither side inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizeResponse<T> {
    pub tokens: T,
}

/// Returns everything before the first `\n`, or the whole string.
pub fn first_line(s: &str) -> &str {
    s.split_once('\n').map_or(s, |(line, _)| line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_stops_at_newline() {
        assert_eq!(first_line("ok\n2024-01-01T00:00:00Z"), "ok");
        assert_eq!(first_line("ok"), "ok");
        assert_eq!(first_line(""), "");
        assert_eq!(first_line("\nok"), "");
    }

    #[test]
    fn request_uses_string_field() {
        let json = serde_json::to_string(&TokenizeRequest::new("my example")).unwrap();
        assert_eq!(json, r#"{"string":"my example"}"#);
    }

    #[test]
    fn request_preserves_awkward_input() {
        for input in ["", " ", "대한민국은 민주공화국이다.", "tab\tnew\nline \"quoted\" \\", "🦀 emoji"] {
            let json = serde_json::to_vec(&TokenizeRequest::new(input)).unwrap();
            let back: TokenizeRequest = serde_json::from_slice(&json).unwrap();
            assert_eq!(back.string, input);
        }
    }

    #[test]
    fn response_payload_is_opaque() {
        let resp: TokenizeResponse<serde_json::Value> =
            serde_json::from_str(r#"{"tokens":{"words":[1,2]}}"#).unwrap();
        assert_eq!(resp.tokens["words"][1], 2);
    }
}
