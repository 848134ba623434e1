use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::notify::DeliveryError;
use crate::stripe::{PaymentError, SignatureError};

/// Error taxonomy for the whole service.
///
/// Everything user-actionable keeps its message on the wire; database
/// failures are logged and replaced with a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("only {remaining} of {limit} guest spots remain")]
    CapacityExceeded { remaining: i64, limit: i64 },

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("RSVP not found")]
    NotFound,

    #[error("{0}")]
    NoRefundablePayment(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "invalid_request",
            ApiError::CapacityExceeded { .. } => "capacity_exceeded",
            ApiError::Payment(PaymentError::CardDeclined(_)) => "card_declined",
            ApiError::Payment(PaymentError::InvalidRequest(_)) => "invalid_payment_request",
            ApiError::Payment(PaymentError::Unavailable(_)) => "payment_unavailable",
            ApiError::NotFound => "not_found",
            ApiError::NoRefundablePayment(_) => "no_refundable_payment",
            ApiError::Signature(_) => "invalid_signature",
            ApiError::Delivery(_) => "delivery_failed",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Db(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            ApiError::Payment(PaymentError::CardDeclined(_)) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Payment(PaymentError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Payment(PaymentError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NoRefundablePayment(_) => StatusCode::BAD_REQUEST,
            ApiError::Signature(_) => StatusCode::BAD_REQUEST,
            ApiError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Db(e) => {
                error!("database error: {e}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message,
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
