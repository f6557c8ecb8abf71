//! Axum router construction for the Tool Server surface.
//!
//! One `Router` built from `State<Arc<AppState>>`, layered with the same
//! tracing + request-ID middleware stack used throughout the rest of the
//! fleet orchestrator.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router as AxumRouter};
use serde_json::Value;

use crate::{error::ToolError, state::AppState, tools};

use super::health::healthz;

/// Names of the eight tools exposed both individually (`POST /tools/{name}`)
/// and via the batched `POST /tools/invoke` envelope.
const TOOL_NAMES: [&str; 8] = [
    "preflight",
    "should_search_web",
    "hosts",
    "models",
    "system",
    "health",
    "ask",
    "inception",
];

/// Build the full Tool Server router.
pub fn router(state: Arc<AppState>) -> AxumRouter {
    let mut app = AxumRouter::new()
        .route("/healthz", axum::routing::get(healthz))
        .route("/tools/invoke", post(invoke));

    for name in TOOL_NAMES {
        let handler = move |State(state): State<Arc<AppState>>, Json(args): Json<Value>| async move {
            invoke_named(name, state, args).await
        };
        app = app.route(&format!("/tools/{name}"), post(handler));
    }

    app.with_state(state)
}

async fn invoke(
    State(state): State<Arc<AppState>>,
    Json(body): Json<tools::ToolInvocation>,
) -> Result<Json<Value>, ToolError> {
    let result = tools::dispatch(&state, &body.tool, body.args).await?;
    Ok(Json(result))
}

async fn invoke_named(
    tool: &'static str,
    state: Arc<AppState>,
    args: Value,
) -> Result<Json<Value>, ToolError> {
    let result = tools::dispatch(&state, tool, args).await?;
    Ok(Json(result))
}
