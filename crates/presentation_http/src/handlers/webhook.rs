//! Webhook endpoint handlers
//!
//! GET answers the provider's subscription handshake; POST verifies the
//! request signature, parses the body, and enqueues updates for the
//! dispatch worker. The POST acknowledgment policy is deliberate: after
//! authentication, every delivery is answered `200 OK` whether or not it
//! produced updates, because anything else makes the provider retry and
//! eventually disable the subscription.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use integration_whatsapp::{check_subscription, parse_updates, verify_signature};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Query parameters of the subscription handshake
#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    #[serde(rename = "hub.mode")]
    pub hub_mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub hub_challenge: Option<String>,
}

/// Subscription handshake (GET).
///
/// The provider sends this once when the webhook URL is registered; the
/// challenge must be echoed verbatim on success.
#[instrument(skip(state, query))]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> impl IntoResponse {
    let Some(mode) = query.hub_mode else {
        debug!("Missing hub.mode in subscription request");
        return (StatusCode::BAD_REQUEST, "Missing hub.mode").into_response();
    };
    if mode != "subscribe" {
        debug!(mode = %mode, "Invalid hub.mode");
        return (StatusCode::BAD_REQUEST, "Invalid hub.mode").into_response();
    }

    let Some(token) = query.hub_verify_token else {
        debug!("Missing hub.verify_token");
        return (StatusCode::BAD_REQUEST, "Missing hub.verify_token").into_response();
    };
    let Some(challenge) = query.hub_challenge else {
        debug!("Missing hub.challenge");
        return (StatusCode::BAD_REQUEST, "Missing hub.challenge").into_response();
    };

    match check_subscription(&token, &state.config.verify_token, challenge) {
        Some(challenge) => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("Webhook subscription rejected: token mismatch");
            (StatusCode::FORBIDDEN, "Token mismatch").into_response()
        }
    }
}

/// Webhook delivery (POST).
#[instrument(skip(state, headers, body))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(app_secret) = &state.config.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !verify_signature(app_secret.expose_secret(), signature, &body) {
            warn!("Webhook signature verification failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid signature" })),
            )
                .into_response();
        }
    }

    let updates = match parse_updates(&body) {
        Ok(updates) => updates,
        Err(e) => {
            // Acknowledge anyway; a non-2xx makes the provider retry the
            // same broken body
            warn!(error = %e, "Discarding unparseable webhook body");
            return (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "ignored" })),
            )
                .into_response();
        }
    };

    let mut accepted = 0_usize;
    for update in updates {
        match state.queue_tx.try_send(update) {
            Ok(()) => accepted += 1,
            Err(e) => error!(error = %e, "Dispatch queue full, dropping update"),
        }
    }

    debug!(accepted, "Webhook delivery acknowledged");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "accepted": accepted })),
    )
        .into_response()
}
