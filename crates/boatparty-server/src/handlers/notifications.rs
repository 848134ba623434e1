use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capacity;
use crate::error::ApiError;
use crate::notify::{Channel, ConfirmationData, NotificationBridge};
use crate::state::SharedState;

use super::ApiJson;

/// Standalone resend endpoints. Unlike the admission flow, delivery
/// failures surface here: there is no paid admission to protect.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfirmation {
    name: String,
    email: String,
    guests: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSms {
    phone_number: String,
    name: String,
    #[serde(default = "default_guests")]
    guests: i32,
}

fn default_guests() -> i32 {
    1
}

/// POST /api/send-confirmation
pub async fn send_confirmation(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<SendConfirmation>,
) -> Result<Json<Value>, ApiError> {
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(ApiError::Validation(
            "name and email are required".to_string(),
        ));
    }
    capacity::check_party_size(payload.guests)?;

    let data = ConfirmationData {
        name: payload.name.trim().to_string(),
        guests: payload.guests,
    };
    let message_id = state
        .notifier
        .send(Channel::Email, payload.email.trim(), &data)
        .await?;

    Ok(Json(json!({
        "success": true,
        "messageId": message_id,
    })))
}

/// POST /api/send-sms
pub async fn send_sms(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<SendSms>,
) -> Result<Json<Value>, ApiError> {
    if payload.phone_number.trim().is_empty() || payload.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "phone number and name are required".to_string(),
        ));
    }

    let data = ConfirmationData {
        name: payload.name.trim().to_string(),
        guests: payload.guests,
    };
    let message_id = state
        .notifier
        .send(Channel::Sms, payload.phone_number.trim(), &data)
        .await?;

    Ok(Json(json!({
        "success": true,
        "messageId": message_id,
    })))
}
