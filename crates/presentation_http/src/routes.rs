//! Route configuration

use axum::{Json, Router, routing::get};

use crate::handlers::webhook;
use crate::state::AppState;

/// Build the router: the webhook endpoint at the configured path plus a
/// plain health probe.
pub fn create_router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();
    Router::new()
        .route(
            &webhook_path,
            get(webhook::verify_webhook).post(webhook::receive_webhook),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
