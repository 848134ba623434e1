//! Payment bridge: Stripe payment intents and refunds over plain HTTP, plus
//! webhook signature verification for the asynchronous event channel.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Replay window for webhook signatures.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Metadata tag identifying this deployment's one event.
pub const EVENT_TAG: &str = "halloween-boat-party";

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("card declined: {0}")]
    CardDeclined(String),

    #[error("invalid payment request: {0}")]
    InvalidRequest(String),

    #[error("payment service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,
}

/// Guest details attached to a charge so the async event stream alone can
/// reconstruct the RSVP.
#[derive(Debug, Clone)]
pub struct ChargeMetadata {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub guest_count: i32,
}

#[derive(Debug, Clone)]
pub struct ChargeAuthorization {
    pub payment_ref: String,
    /// Handed to the browser so it can confirm the card.
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_ref: String,
    pub refunded_amount_cents: i64,
    pub status: String,
}

/// External payment processor boundary. Single attempt, no built-in retry;
/// timeout behavior lives in the implementation.
#[async_trait]
pub trait PaymentBridge: Send + Sync {
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &ChargeMetadata,
    ) -> Result<ChargeAuthorization, PaymentError>;

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, PaymentError>;
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    amount: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let url = format!("{STRIPE_API_BASE}{path}");
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(map_stripe_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| PaymentError::Unavailable(format!("invalid response body: {e}")))
    }
}

fn map_stripe_error(status: u16, body: &str) -> PaymentError {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {status}"));
            match parsed.error.kind.as_deref() {
                Some("card_error") => PaymentError::CardDeclined(message),
                Some("invalid_request_error") => PaymentError::InvalidRequest(message),
                _ => PaymentError::Unavailable(message),
            }
        }
        Err(_) => PaymentError::Unavailable(format!("HTTP {status}")),
    }
}

#[async_trait]
impl PaymentBridge for StripeClient {
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &ChargeMetadata,
    ) -> Result<ChargeAuthorization, PaymentError> {
        let mut params = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "description".to_string(),
                format!("Halloween Boat Party - {}", metadata.customer_name),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                "metadata[customer_name]".to_string(),
                metadata.customer_name.clone(),
            ),
            (
                "metadata[customer_email]".to_string(),
                metadata.customer_email.clone(),
            ),
            (
                "metadata[guest_count]".to_string(),
                metadata.guest_count.to_string(),
            ),
            ("metadata[event]".to_string(), EVENT_TAG.to_string()),
        ];
        if let Some(phone) = &metadata.customer_phone {
            params.push(("metadata[customer_phone]".to_string(), phone.clone()));
        }

        let intent: PaymentIntentResponse = self.post_form("/payment_intents", &params).await?;
        Ok(ChargeAuthorization {
            payment_ref: intent.id,
            client_secret: intent.client_secret,
        })
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, PaymentError> {
        let mut params = vec![
            ("payment_intent".to_string(), payment_ref.to_string()),
            (
                "reason".to_string(),
                reason.unwrap_or("requested_by_customer").to_string(),
            ),
        ];
        if let Some(amount) = amount_cents {
            params.push(("amount".to_string(), amount.to_string()));
        }

        let refund: RefundResponse = self.post_form("/refunds", &params).await?;
        Ok(RefundOutcome {
            refund_ref: refund.id,
            refunded_amount_cents: refund.amount,
            status: refund.status,
        })
    }
}

// --- Asynchronous event channel ---

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookEventObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Verify a `Stripe-Signature` header (`t=<unix ts>,v1=<hmac-sha256 hex>`)
/// against the raw request body. An invalid signature is a hard rejection;
/// the payload must not be parsed, let alone acted on, before this passes.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    // Signed payload is "{timestamp}.{raw body}".
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    for candidate in candidates {
        let Some(bytes) = hex_decode(candidate) else {
            continue;
        };
        if bool::from(expected.as_slice().ct_eq(bytes.as_slice())) {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_card_errors() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        assert!(matches!(
            map_stripe_error(402, body),
            PaymentError::CardDeclined(m) if m == "Your card was declined."
        ));
    }

    #[test]
    fn maps_invalid_request_errors() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such payment_intent"}}"#;
        assert!(matches!(
            map_stripe_error(404, body),
            PaymentError::InvalidRequest(_)
        ));
    }

    #[test]
    fn unparseable_error_bodies_become_unavailable() {
        assert!(matches!(
            map_stripe_error(500, "<html>bad gateway</html>"),
            PaymentError::Unavailable(m) if m == "HTTP 500"
        ));
    }

    #[test]
    fn parses_succeeded_event_with_metadata() {
        let payload = br#"{
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_123",
                "metadata": {"customer_name": "Ana", "customer_email": "ana@example.com", "guest_count": "3"}
            }}
        }"#;
        let event = parse_webhook_event(payload).unwrap();
        assert_eq!(event.event_type, EVENT_PAYMENT_SUCCEEDED);
        assert_eq!(event.data.object.id, "pi_123");
        assert_eq!(
            event.data.object.metadata.get("guest_count").map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn hex_decode_rejects_junk() {
        assert_eq!(hex_decode("deadbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(hex_decode("abc"), None);
        assert_eq!(hex_decode("zz"), None);
    }
}
