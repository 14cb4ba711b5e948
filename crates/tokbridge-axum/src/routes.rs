//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{SecondsFormat, Utc};
use tokbridge_core::{
    HEALTHZ_PATH, READINESS_TOKEN, TOKENIZE_PATH, TokenizeRequest, TokenizeResponse,
    TokenizerEngine,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::HttpError;

/// Build the tokenizer server router around `engine`.
///
/// Request bodies are not size limited; any string the wire format can carry
/// reaches the engine.
pub fn create_router<E: TokenizerEngine>(engine: Arc<E>) -> Router {
    Router::new()
        .route(HEALTHZ_PATH, get(healthz).fallback(method_not_allowed))
        .route(TOKENIZE_PATH, post(tokenize::<E>).fallback(method_not_allowed))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn healthz(method: Method) -> Result<impl IntoResponse, HttpError> {
    // `get` routes HEAD here as well; only GET is a health check.
    if method != Method::GET {
        return Err(HttpError::MethodNotAllowed);
    }
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{READINESS_TOKEN}\n{now}"),
    ))
}

/// The body is decoded as JSON whatever its content type says.
async fn tokenize<E: TokenizerEngine>(
    State(engine): State<Arc<E>>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let request: TokenizeRequest =
        serde_json::from_slice(&body).map_err(|e| HttpError::Unprocessable(e.to_string()))?;

    debug!(chars = request.string.chars().count(), "Tokenize request");

    // Engines may wrap blocking FFI.
    let tokens = tokio::task::spawn_blocking(move || engine.tokenize(&request.string))
        .await
        .map_err(|e| HttpError::Internal(format!("tokenizer task failed: {e}")))?
        .map_err(|e| HttpError::Unprocessable(e.to_string()))?;

    let body = serde_json::to_vec(&TokenizeResponse { tokens })
        .map_err(|e| HttpError::Internal(format!("failed to encode tokens: {e}")))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn method_not_allowed() -> HttpError {
    HttpError::MethodNotAllowed
}
