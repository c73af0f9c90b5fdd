use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use concierge_line::{WebhookError, WebhookProcessor, SIGNATURE_HEADER};
use tracing::warn;

#[derive(Clone)]
pub struct WebhookState {
    processor: Arc<WebhookProcessor>,
}

pub fn router(processor: Arc<WebhookProcessor>) -> Router {
    Router::new().route("/webhook/line", post(line_webhook)).with_state(WebhookState { processor })
}

/// Handles a delivery synchronously: every text event is answered before the
/// response is returned.
pub async fn line_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<&'static str>) {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    match state.processor.process(signature, &body).await {
        Ok(_) => (StatusCode::OK, Json("Success")),
        Err(WebhookError::Signature(_)) => (StatusCode::FORBIDDEN, Json("Invalid signature")),
        Err(WebhookError::Payload(detail)) => {
            warn!(
                event_name = "line.webhook.bad_payload",
                detail = %detail,
                "webhook body could not be decoded"
            );
            (StatusCode::BAD_REQUEST, Json("Invalid payload"))
        }
    }
}
