use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub mod admin;
pub mod notifications;
pub mod payments;
pub mod rsvps;
pub mod webhook;

/// `Json` with its rejections folded into the service error envelope, so a
/// malformed body gets the same `{"success":false,"error":{...}}` shape as
/// every other failure instead of axum's plain-text default.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(format!("invalid JSON body: {rejection}")))?;
        Ok(Self(value))
    }
}
