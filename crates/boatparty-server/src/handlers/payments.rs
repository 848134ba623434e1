use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capacity;
use crate::error::ApiError;
use crate::lifecycle::GuestInfo;
use crate::state::SharedState;
use crate::store::RecordStore;

use super::ApiJson;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntent {
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
    guests: i32,
}

/// POST /api/create-payment-intent
///
/// The synchronous submission path: party-size validation and the capacity
/// gate run before any charge is attempted. The ticket amount is computed
/// server-side from the canonical unit price.
pub async fn create_payment_intent(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<CreatePaymentIntent>,
) -> Result<Json<Value>, ApiError> {
    let info = GuestInfo {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_string(),
        phone: payload
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    };

    let authorization = state.controller().submit(&info, payload.guests).await?;

    Ok(Json(json!({
        "client_secret": authorization.client_secret,
        "payment_intent_id": authorization.payment_ref,
    })))
}

/// GET /api/capacity
///
/// Public remaining-spots figure for the landing page, without exposing
/// guest records.
pub async fn capacity_status(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let records = state.store().list_all().await?;

    Ok(Json(json!({
        "limit": capacity::GUEST_LIMIT,
        "admitted": capacity::admitted_guests(&records),
        "remaining": capacity::remaining_spots(&records),
    })))
}
