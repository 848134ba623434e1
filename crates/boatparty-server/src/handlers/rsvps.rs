use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use entity::rsvp::{self, PaymentStatus};

use crate::capacity;
use crate::error::ApiError;
use crate::lifecycle::GuestInfo;
use crate::state::SharedState;
use crate::store::{NewRsvp, RecordStore, RsvpPatch};
use crate::util::ts_to_rfc3339;

use super::admin::ensure_admin_authorized;
use super::ApiJson;

pub fn rsvp_json(r: &rsvp::Model) -> Value {
    json!({
        "id": r.id,
        "name": r.name,
        "email": r.email,
        "phone": r.phone,
        "guests": r.guests,
        "paymentStatus": r.payment_status.as_str(),
        "paymentIntentId": r.payment_intent_id,
        "refundId": r.refund_id,
        "refundAmount": r.refund_amount,
        "createdAt": ts_to_rfc3339(r.created_at),
        "updatedAt": ts_to_rfc3339(r.updated_at),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRsvp {
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
    guests: i32,
    #[serde(default)]
    payment_intent_id: Option<String>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRsvp {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<Option<String>>,
    #[serde(default)]
    guests: Option<i32>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    #[serde(default)]
    amount_cents: Option<i64>,
    #[serde(default)]
    reason: Option<String>,
}

/// GET /api/rsvps (admin)
pub async fn list_rsvps(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    let records = state.store().list_all().await?;
    let data: Vec<Value> = records.iter().map(rsvp_json).collect();
    Ok(Json(json!({
        "data": data,
        "object": "list",
    })))
}

/// POST /api/rsvps
///
/// With a `paymentIntentId` this is the client-side success callback: a
/// known charge ref is read back, an unknown one writes a provisional
/// `pending` row that the verified webhook later promotes. Without one it
/// inserts a manual row. Neither case counts toward capacity until the
/// webhook confirms.
pub async fn create_rsvp(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<CreateRsvp>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    capacity::check_party_size(payload.guests)?;

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
    info.validate()?;

    let payment_ref = payload
        .payment_intent_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(payment_ref) = payment_ref {
        let (record, created) = state
            .controller()
            .record_client_callback(&info, payload.guests, payment_ref)
            .await?;
        let status = if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        return Ok((status, Json(rsvp_json(&record))));
    }

    let record = state
        .store()
        .create(NewRsvp {
            name: info.name,
            email: info.email,
            phone: info.phone,
            guests: payload.guests,
            payment_status: payload.payment_status.unwrap_or(PaymentStatus::Pending),
            payment_intent_id: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(rsvp_json(&record))))
}

/// GET /api/rsvps/{id} (admin)
pub async fn get_rsvp(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    let record = state.store().get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(rsvp_json(&record)))
}

/// PUT /api/rsvps/{id} (admin)
///
/// The override path: contact fields, guest count, and status can be edited
/// directly. Guest-count edits are deliberately outside the normal
/// lifecycle.
pub async fn update_rsvp(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<UpdateRsvp>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    if let Some(guests) = payload.guests {
        capacity::check_party_size(guests)?;
    }
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("name cannot be blank".to_string()));
        }
    }
    if let Some(email) = &payload.email {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("a valid email is required".to_string()));
        }
    }

    let patch = RsvpPatch {
        name: payload.name.map(|v| v.trim().to_string()),
        email: payload.email.map(|v| v.trim().to_string()),
        phone: payload.phone,
        guests: payload.guests,
        payment_status: payload.payment_status,
        ..Default::default()
    };

    let record = state
        .store()
        .update(id, patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(rsvp_json(&record)))
}

/// DELETE /api/rsvps/{id} (admin)
///
/// Attempts a refund first; deletion proceeds regardless of the refund
/// outcome, which is reported in the response.
pub async fn delete_rsvp(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    let status = state.controller().delete_with_refund(id).await?;
    Ok(Json(json!({
        "message": "RSVP deleted successfully",
        "refundStatus": status.as_str(),
    })))
}

/// POST /api/rsvps/{id}/refund (admin)
pub async fn refund_rsvp(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<RefundRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    if let Some(amount) = payload.amount_cents {
        if amount <= 0 {
            return Err(ApiError::Validation(
                "amountCents must be a positive number of cents".to_string(),
            ));
        }
    }

    let (_, outcome) = state
        .controller()
        .refund(id, payload.amount_cents, payload.reason.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Refund processed successfully",
        "refundId": outcome.refund_ref,
        "amount": outcome.refunded_amount_cents,
        "status": outcome.status,
    })))
}
