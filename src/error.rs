//! Unified HTTP error type for axum request handlers.
//!
//! [`ToolError`] wraps [`anyhow::Error`] and converts it into an appropriate
//! HTTP response automatically via [`IntoResponse`]. This means every handler
//! that can fail can return `Result<T, ToolError>` and propagate errors with
//! `?` — no manual `map_err`, no boilerplate.
//!
//! A *tool-level* failure (the backend call itself failed,
//! no host had the model, a sub-query timed out) is not a transport error —
//! those are reported in-band by the tool handlers as `{"error": "..."}`
//! values with a `200 OK`. [`ToolError`] exists for the narrower case of a
//! malformed request reaching the boundary at all (bad JSON body, unknown
//! tool name) — see `tools::invoke`.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn my_handler(
//!     State(state): State<Arc<AppState>>,
//! ) -> Result<Json<Value>, ToolError> {
//!     let result = state.some_fallible_operation().await?;
//!     Ok(Json(result))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers.
///
/// Any type that implements `Into<anyhow::Error>` (which includes `io::Error`,
/// `reqwest::Error`, and any `#[derive(thiserror::Error)]` type) can be
/// converted into a [`ToolError`] via the blanket [`From`] implementation.
#[derive(Debug)]
pub struct ToolError(anyhow::Error);

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "handler error");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Convert any `Into<anyhow::Error>` into a [`ToolError`].
///
/// This is the idiomatic axum pattern — see
/// <https://docs.rs/axum/latest/axum/error_handling/index.html>.
impl<E> From<E> for ToolError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
