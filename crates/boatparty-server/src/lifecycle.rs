//! RSVP lifecycle controller.
//!
//! Orchestrates submission -> capacity check -> charge authorization, the
//! asynchronous payment-event reconciliation, and refunds. The
//! signature-verified event stream is the authoritative writer for
//! `completed`; the synchronous client callback funnels through the same
//! upsert keyed by charge ref, so the two paths can never produce unrelated
//! rows for one charge.

use entity::rsvp::{self, PaymentStatus};
use tracing::{info, warn};

use crate::capacity::{self, CURRENCY, UNIT_PRICE_CENTS};
use crate::error::ApiError;
use crate::notify::{Channel, ConfirmationData, NotificationBridge};
use crate::store::{NewRsvp, RecordStore, RsvpPatch};
use crate::stripe::{
    ChargeAuthorization, ChargeMetadata, PaymentBridge, RefundOutcome, WebhookEvent,
    EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED,
};

#[derive(Debug, Clone)]
pub struct GuestInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl GuestInfo {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name is required".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("a valid email is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Refunded,
    RefundFailed,
    NoPayment,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Refunded => "refunded",
            RefundStatus::RefundFailed => "refund_failed",
            RefundStatus::NoPayment => "no_payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Recorded { rsvp_id: i64, created: bool },
    Ignored,
}

pub struct LifecycleController<S, P, N> {
    store: S,
    payments: P,
    notifier: N,
}

impl<S, P, N> LifecycleController<S, P, N>
where
    S: RecordStore,
    P: PaymentBridge,
    N: NotificationBridge,
{
    pub fn new(store: S, payments: P, notifier: N) -> Self {
        Self {
            store,
            payments,
            notifier,
        }
    }

    /// Validate, gate against capacity, then authorize the charge. A
    /// rejection means no charge was attempted and no row was written.
    pub async fn submit(
        &self,
        info: &GuestInfo,
        guests: i32,
    ) -> Result<ChargeAuthorization, ApiError> {
        info.validate()?;
        capacity::check_party_size(guests)?;

        // The gate must run against a fresh listing, not a cached count.
        let records = self.store.list_all().await?;
        capacity::can_admit(guests, capacity::remaining_spots(&records))?;

        let metadata = ChargeMetadata {
            customer_name: info.name.clone(),
            customer_email: info.email.clone(),
            customer_phone: info.phone.clone(),
            guest_count: guests,
        };
        // Amount is computed here; client-supplied amounts are never trusted.
        let amount_cents = i64::from(guests) * UNIT_PRICE_CENTS;
        let authorization = self.payments.authorize(amount_cents, CURRENCY, &metadata).await?;

        info!(
            payment_ref = %authorization.payment_ref,
            guests,
            amount_cents,
            "payment authorized"
        );
        Ok(authorization)
    }

    /// Upsert a completed admission keyed by charge ref. Only the
    /// signature-verified event channel writes `completed`; re-delivery of
    /// the same ref confirms the existing row and never duplicates it.
    /// Confirmation messages go out once, when the row first reaches
    /// `completed`, best-effort.
    pub async fn record_admission(
        &self,
        info: &GuestInfo,
        guests: i32,
        payment_ref: &str,
    ) -> Result<(rsvp::Model, bool), ApiError> {
        if let Some(existing) = self.store.find_by_payment_ref(payment_ref).await? {
            if existing.payment_status == PaymentStatus::Completed {
                return Ok((existing, false));
            }
            let confirmed = self
                .store
                .update(
                    existing.id,
                    RsvpPatch {
                        payment_status: Some(PaymentStatus::Completed),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or(ApiError::NotFound)?;
            self.send_confirmations(&confirmed).await;
            return Ok((confirmed, false));
        }

        let created = self
            .store
            .create(NewRsvp {
                name: info.name.clone(),
                email: info.email.clone(),
                phone: info.phone.clone(),
                guests,
                payment_status: PaymentStatus::Completed,
                payment_intent_id: Some(payment_ref.to_string()),
            })
            .await?;

        self.send_confirmations(&created).await;
        Ok((created, true))
    }

    /// The synchronous client success callback. The caller is
    /// unauthenticated, so an unknown charge ref only produces a provisional
    /// `pending` row that holds no guest spots; a known ref is read back
    /// as-is. The verified event channel promotes and confirms.
    pub async fn record_client_callback(
        &self,
        info: &GuestInfo,
        guests: i32,
        payment_ref: &str,
    ) -> Result<(rsvp::Model, bool), ApiError> {
        if let Some(existing) = self.store.find_by_payment_ref(payment_ref).await? {
            return Ok((existing, false));
        }

        let created = self
            .store
            .create(NewRsvp {
                name: info.name.clone(),
                email: info.email.clone(),
                phone: info.phone.clone(),
                guests,
                payment_status: PaymentStatus::Pending,
                payment_intent_id: Some(payment_ref.to_string()),
            })
            .await?;

        info!(
            payment_ref = %payment_ref,
            rsvp_id = created.id,
            "provisional RSVP recorded ahead of payment confirmation"
        );
        Ok((created, true))
    }

    /// Best-effort: the paid admission already succeeded, so delivery
    /// failures are logged and never propagated.
    async fn send_confirmations(&self, record: &rsvp::Model) {
        let data = ConfirmationData {
            name: record.name.clone(),
            guests: record.guests,
        };
        if let Err(e) = self.notifier.send(Channel::Email, &record.email, &data).await {
            warn!(rsvp_id = record.id, "confirmation email failed: {e}");
        }
        if let Some(phone) = &record.phone {
            if let Err(e) = self.notifier.send(Channel::Sms, phone, &data).await {
                warn!(rsvp_id = record.id, "confirmation SMS failed: {e}");
            }
        }
    }

    /// Handle one signature-verified payment event. Callers must have
    /// rejected unauthenticated payloads already.
    pub async fn reconcile_event(
        &self,
        event: &WebhookEvent,
    ) -> Result<ReconcileOutcome, ApiError> {
        match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => {
                let object = &event.data.object;
                let info = GuestInfo {
                    name: object
                        .metadata
                        .get("customer_name")
                        .cloned()
                        .unwrap_or_default(),
                    email: object
                        .metadata
                        .get("customer_email")
                        .cloned()
                        .unwrap_or_default(),
                    phone: object.metadata.get("customer_phone").cloned(),
                };
                // Intents created before guest_count was added to the
                // metadata fall back to a single guest.
                let guests = object
                    .metadata
                    .get("guest_count")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1);

                let (record, created) = self.record_admission(&info, guests, &object.id).await?;
                info!(
                    payment_ref = %object.id,
                    rsvp_id = record.id,
                    created,
                    "charge succeeded event reconciled"
                );
                Ok(ReconcileOutcome::Recorded {
                    rsvp_id: record.id,
                    created,
                })
            }
            EVENT_PAYMENT_FAILED => {
                // No row exists yet for a failed charge; nothing to compensate.
                info!(payment_ref = %event.data.object.id, "payment failed event received");
                Ok(ReconcileOutcome::Ignored)
            }
            other => {
                info!("unhandled event type {other}");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// Full or partial refund. The record is only mutated after the bridge
    /// confirms; a bridge failure surfaces to the caller unchanged.
    pub async fn refund(
        &self,
        id: i64,
        amount_cents: Option<i64>,
        reason: Option<&str>,
    ) -> Result<(rsvp::Model, RefundOutcome), ApiError> {
        let record = self.store.get(id).await?.ok_or(ApiError::NotFound)?;

        if record.payment_status == PaymentStatus::Refunded {
            return Err(ApiError::NoRefundablePayment(
                "RSVP has already been refunded".to_string(),
            ));
        }
        let Some(payment_ref) = record.payment_intent_id.clone() else {
            return Err(ApiError::NoRefundablePayment(
                "no payment found for this RSVP".to_string(),
            ));
        };

        let outcome = self.payments.refund(&payment_ref, amount_cents, reason).await?;

        let updated = self
            .store
            .update(
                id,
                RsvpPatch {
                    payment_status: Some(PaymentStatus::Refunded),
                    refund_id: Some(outcome.refund_ref.clone()),
                    refund_amount: Some(outcome.refunded_amount_cents),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(ApiError::NotFound)?;

        info!(rsvp_id = id, refund_ref = %outcome.refund_ref, "refund processed");
        Ok((updated, outcome))
    }

    /// Delete after a best-effort refund. A bridge failure during the refund
    /// is logged and deletion proceeds anyway; that exception is intentional
    /// and applies only here, not to the standalone refund path.
    pub async fn delete_with_refund(&self, id: i64) -> Result<RefundStatus, ApiError> {
        let record = self.store.get(id).await?.ok_or(ApiError::NotFound)?;

        let refundable = record.payment_intent_id.is_some()
            && record.payment_status != PaymentStatus::Refunded;
        let status = if refundable {
            match self.refund(id, None, Some("requested_by_customer")).await {
                Ok(_) => RefundStatus::Refunded,
                Err(ApiError::Payment(e)) => {
                    warn!(rsvp_id = id, "refund before delete failed: {e}");
                    RefundStatus::RefundFailed
                }
                Err(e) => return Err(e),
            }
        } else {
            RefundStatus::NoPayment
        };

        if !self.store.delete(id).await? {
            return Err(ApiError::NotFound);
        }

        info!(rsvp_id = id, refund_status = status.as_str(), "RSVP deleted");
        Ok(status)
    }
}
