use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::SharedState;
use crate::stripe::{parse_webhook_event, verify_webhook_signature, SignatureError};
use crate::util::now_ts;

/// POST /api/webhook
///
/// The asynchronous payment-event channel. The raw body is verified against
/// the `Stripe-Signature` header before anything is parsed; an invalid
/// signature is a hard 400. Handled deliveries are always acked with
/// `{"received": true}` so the processor only retries on real failures.
pub async fn handle_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Signature(SignatureError::MalformedHeader))?;

    verify_webhook_signature(
        &payload,
        signature,
        &state.config.stripe_webhook_secret,
        now_ts(),
    )?;

    let event = parse_webhook_event(&payload)
        .map_err(|e| ApiError::Validation(format!("invalid event payload: {e}")))?;

    state.controller().reconcile_event(&event).await?;

    Ok(Json(json!({ "received": true })))
}
