//! Webhook endpoint the chat platform delivers updates to.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};

use crate::channels::Update;
use crate::dispatcher::Dispatcher;

/// Fixed acknowledgement body.
pub const ACK: &str = "ok";

/// Shared state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
}

/// POST /webhook
///
/// Always answers `200 ok`. Malformed payloads and processing failures are
/// logged; the platform would only redeliver them.
async fn receive_update(State(state): State<WebhookState>, body: Bytes) -> &'static str {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Discarding malformed update");
            return ACK;
        }
    };

    if let Err(e) = state.dispatcher.dispatch(&update).await {
        tracing::error!(update_id = update.update_id, error = %e, "Failed to process update");
    }
    ACK
}

/// GET /health
async fn health() -> &'static str {
    ACK
}

/// Build the webhook routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(receive_update))
        .route("/health", get(health))
        .with_state(state)
}
