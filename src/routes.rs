//! Router assembly.
//!
//! The concierge API lives under `/api/coffee-assistant`; every other path is
//! served as a static file from the site root. Unknown API routes, and any
//! method other than GET or HEAD outside the API, get a JSON 404.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, get_service, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::concierge::{Concierge, DEFAULT_PAGE_HINT};

#[derive(Clone)]
pub struct AppState {
    pub concierge: Arc<Concierge>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    model_loaded: bool,
    model_error: Option<String>,
}

/// Full application router: API routes plus static files from `site_root`.
pub fn app(state: AppState, site_root: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api/coffee-assistant", post(ask).fallback(not_found))
        .route("/api/coffee-assistant/health", get(health).fallback(not_found))
        .route("/api/{*rest}", any(not_found))
        .with_state(state)
        .fallback_service(get_service(ServeDir::new(site_root.as_ref())).fallback(not_found))
        .layer(TraceLayer::new_for_http())
}

async fn ask(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = if body.is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => Value::Object(map),
            _ => {
                debug!(len = body.len(), "routes: rejected request body");
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_json" }))).into_response();
            }
        }
    };

    let message = field_text(&payload, "message").unwrap_or_default();
    let page = field_text(&payload, "page").unwrap_or_else(|| DEFAULT_PAGE_HINT.to_string());
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing_message", "message": "Message is required." })),
        )
            .into_response();
    }

    let reply = state.concierge.reply(&message, &page).await;
    (StatusCode::OK, Json(reply)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let generator = state.concierge.generator();
    Json(HealthResponse {
        status: "ok",
        model: generator.model().to_string(),
        model_loaded: generator.is_loaded(),
        model_error: generator.last_error(),
    })
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" }))).into_response()
}

/// Trimmed text of a payload field. Non-string scalars are stringified;
/// a missing or `null` field is `None`.
fn field_text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string().trim().to_string()),
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
