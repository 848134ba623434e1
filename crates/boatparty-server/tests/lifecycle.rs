//! End-to-end lifecycle coverage over an in-memory store and mock external
//! bridges: capacity gating, payment-event reconciliation, refunds, and
//! delete-with-refund.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use boatparty_server::capacity;
use boatparty_server::error::ApiError;
use boatparty_server::lifecycle::{GuestInfo, LifecycleController, ReconcileOutcome, RefundStatus};
use boatparty_server::notify::{Channel, ConfirmationData, DeliveryError, NotificationBridge};
use boatparty_server::store::{NewRsvp, RecordStore, RsvpPatch};
use boatparty_server::stripe::{
    parse_webhook_event, ChargeAuthorization, ChargeMetadata, PaymentBridge, PaymentError,
    RefundOutcome,
};
use entity::rsvp::{self, PaymentStatus};
use sea_orm::DbErr;

#[derive(Clone, Default)]
struct MemoryStore {
    rows: Arc<Mutex<Vec<rsvp::Model>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    fn snapshot(&self) -> Vec<rsvp::Model> {
        self.rows.lock().unwrap().clone()
    }

    fn seed_completed(&self, guests: i32, payment_ref: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().unwrap().push(rsvp::Model {
            id,
            name: format!("Seed {id}"),
            email: format!("seed{id}@example.com"),
            phone: None,
            guests,
            payment_status: PaymentStatus::Completed,
            payment_intent_id: Some(payment_ref.to_string()),
            refund_id: None,
            refund_amount: None,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        });
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, new: NewRsvp) -> Result<rsvp::Model, DbErr> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let model = rsvp::Model {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            guests: new.guests,
            payment_status: new.payment_status,
            payment_intent_id: new.payment_intent_id,
            refund_id: None,
            refund_amount: None,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        };
        self.rows.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn get(&self, id: i64) -> Result<Option<rsvp::Model>, DbErr> {
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<rsvp::Model>, DbErr> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.payment_intent_id.as_deref() == Some(payment_ref))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<rsvp::Model>, DbErr> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn update(&self, id: i64, patch: RsvpPatch) -> Result<Option<rsvp::Model>, DbErr> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(email) = patch.email {
            row.email = email;
        }
        if let Some(phone) = patch.phone {
            row.phone = phone;
        }
        if let Some(guests) = patch.guests {
            row.guests = guests;
        }
        if let Some(status) = patch.payment_status {
            row.payment_status = status;
        }
        if let Some(payment_intent_id) = patch.payment_intent_id {
            row.payment_intent_id = payment_intent_id;
        }
        if let Some(refund_id) = patch.refund_id {
            row.refund_id = Some(refund_id);
        }
        if let Some(refund_amount) = patch.refund_amount {
            row.refund_amount = Some(refund_amount);
        }
        row.updated_at += 1;
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, DbErr> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}

#[derive(Clone, Default)]
struct MockPayments {
    authorize_calls: Arc<AtomicUsize>,
    refund_calls: Arc<AtomicUsize>,
    fail_refunds: Arc<AtomicBool>,
}

#[async_trait]
impl PaymentBridge for MockPayments {
    async fn authorize(
        &self,
        amount_cents: i64,
        _currency: &str,
        _metadata: &ChargeMetadata,
    ) -> Result<ChargeAuthorization, PaymentError> {
        let n = self.authorize_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChargeAuthorization {
            payment_ref: format!("pi_mock_{n}_{amount_cents}"),
            client_secret: Some(format!("pi_mock_{n}_secret")),
        })
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
        _reason: Option<&str>,
    ) -> Result<RefundOutcome, PaymentError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("mock outage".to_string()));
        }
        Ok(RefundOutcome {
            refund_ref: format!("re_mock_{payment_ref}"),
            refunded_amount_cents: amount_cents.unwrap_or(4000),
            status: "succeeded".to_string(),
        })
    }
}

#[derive(Clone, Default)]
struct MockNotifier {
    email_sends: Arc<AtomicUsize>,
    sms_sends: Arc<AtomicUsize>,
    fail_all: Arc<AtomicBool>,
}

#[async_trait]
impl NotificationBridge for MockNotifier {
    async fn send(
        &self,
        channel: Channel,
        _recipient: &str,
        _data: &ConfirmationData,
    ) -> Result<String, DeliveryError> {
        match channel {
            Channel::Email => self.email_sends.fetch_add(1, Ordering::SeqCst),
            Channel::Sms => self.sms_sends.fetch_add(1, Ordering::SeqCst),
        };
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DeliveryError("mock delivery failure".to_string()));
        }
        Ok("msg_mock".to_string())
    }
}

fn controller(
    store: &MemoryStore,
    payments: &MockPayments,
    notifier: &MockNotifier,
) -> LifecycleController<MemoryStore, MockPayments, MockNotifier> {
    LifecycleController::new(store.clone(), payments.clone(), notifier.clone())
}

fn guest(name: &str, phone: Option<&str>) -> GuestInfo {
    GuestInfo {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: phone.map(str::to_string),
    }
}

#[tokio::test]
async fn invalid_party_size_never_reaches_the_payment_bridge() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let err = ctl.submit(&guest("Ana", None), 0).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    let err = ctl.submit(&guest("Ana", None), 11).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = ctl
        .submit(
            &GuestInfo {
                name: "Ana".to_string(),
                email: "not-an-email".to_string(),
                phone: None,
            },
            2,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    assert_eq!(payments.authorize_calls.load(Ordering::SeqCst), 0);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn capacity_gate_rejects_before_charging() {
    let store = MemoryStore::default();
    // 78 of 80 spots already admitted.
    store.seed_completed(10, "pi_a");
    store.seed_completed(10, "pi_b");
    store.seed_completed(10, "pi_c");
    store.seed_completed(10, "pi_d");
    store.seed_completed(10, "pi_e");
    store.seed_completed(10, "pi_f");
    store.seed_completed(10, "pi_g");
    store.seed_completed(8, "pi_h");

    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let err = ctl.submit(&guest("Ana", None), 5).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::CapacityExceeded { remaining: 2, limit: 80 }
    ));
    assert_eq!(payments.authorize_calls.load(Ordering::SeqCst), 0);

    // A party that fits the remainder is still charged.
    let auth = ctl.submit(&guest("Bo", None), 2).await.unwrap();
    assert!(auth.payment_ref.contains("8000"));
    assert_eq!(payments.authorize_calls.load(Ordering::SeqCst), 1);

    // Once the event reconciles, the event is full and everything bounces.
    ctl.record_admission(&guest("Bo", None), 2, &auth.payment_ref)
        .await
        .unwrap();
    let err = ctl.submit(&guest("Cy", None), 1).await.unwrap_err();
    assert!(matches!(err, ApiError::CapacityExceeded { remaining: 0, .. }));
}

#[tokio::test]
async fn reconcile_succeeded_event_creates_one_row_and_replays_idempotently() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let payload = br#"{
        "type": "payment_intent.succeeded",
        "data": {"object": {
            "id": "pi_evt_1",
            "metadata": {
                "customer_name": "Ana",
                "customer_email": "ana@example.com",
                "customer_phone": "5125550134",
                "guest_count": "3"
            }
        }}
    }"#;
    let event = parse_webhook_event(payload).unwrap();

    let outcome = ctl.reconcile_event(&event).await.unwrap();
    let ReconcileOutcome::Recorded { rsvp_id, created } = outcome else {
        panic!("expected Recorded, got {outcome:?}");
    };
    assert!(created);

    let rows = store.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, rsvp_id);
    assert_eq!(rows[0].guests, 3);
    assert_eq!(rows[0].payment_status, PaymentStatus::Completed);
    assert_eq!(rows[0].payment_intent_id.as_deref(), Some("pi_evt_1"));
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.sms_sends.load(Ordering::SeqCst), 1);

    // Redelivery confirms the same row, duplicates nothing, resends nothing.
    let outcome = ctl.reconcile_event(&event).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Recorded {
            rsvp_id,
            created: false
        }
    );
    assert_eq!(store.snapshot().len(), 1);
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reconcile_without_guest_count_falls_back_to_one() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let payload = br#"{
        "type": "payment_intent.succeeded",
        "data": {"object": {
            "id": "pi_old",
            "metadata": {"customer_name": "Bo", "customer_email": "bo@example.com"}
        }}
    }"#;
    let event = parse_webhook_event(payload).unwrap();
    ctl.reconcile_event(&event).await.unwrap();

    let rows = store.snapshot();
    assert_eq!(rows[0].guests, 1);
}

#[tokio::test]
async fn failed_and_unknown_events_write_nothing() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let failed = parse_webhook_event(
        br#"{"type": "payment_intent.payment_failed", "data": {"object": {"id": "pi_x"}}}"#,
    )
    .unwrap();
    assert_eq!(
        ctl.reconcile_event(&failed).await.unwrap(),
        ReconcileOutcome::Ignored
    );

    let unknown = parse_webhook_event(
        br#"{"type": "charge.updated", "data": {"object": {"id": "ch_1"}}}"#,
    )
    .unwrap();
    assert_eq!(
        ctl.reconcile_event(&unknown).await.unwrap(),
        ReconcileOutcome::Ignored
    );

    assert!(store.snapshot().is_empty());
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reconcile_promotes_a_pending_row_and_confirms_once() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    // The synchronous callback already wrote a pending row for this charge.
    store
        .create(NewRsvp {
            name: "Cy".to_string(),
            email: "cy@example.com".to_string(),
            phone: None,
            guests: 2,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: Some("pi_shared".to_string()),
        })
        .await
        .unwrap();

    let (record, created) = ctl
        .record_admission(&guest("Cy", None), 2, "pi_shared")
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(record.payment_status, PaymentStatus::Completed);
    assert_eq!(store.snapshot().len(), 1);
    // The pending->completed transition sends the confirmation.
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);

    // Redelivery of the same ref does not resend.
    ctl.record_admission(&guest("Cy", None), 2, "pi_shared")
        .await
        .unwrap();
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_callback_with_an_unknown_ref_is_provisional_only() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    // An invented charge ref from an unauthenticated caller must not
    // produce a capacity-consuming admission or a confirmation.
    let (record, created) = ctl
        .record_client_callback(&guest("Mallory", None), 10, "pi_fake")
        .await
        .unwrap();
    assert!(created);
    assert_eq!(record.payment_status, PaymentStatus::Pending);
    assert_eq!(capacity::admitted_guests(&store.snapshot()), 0);
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 0);

    // Replaying the callback reads the row back instead of duplicating it.
    let (again, created) = ctl
        .record_client_callback(&guest("Mallory", None), 10, "pi_fake")
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(again.id, record.id);
    assert_eq!(store.snapshot().len(), 1);

    // Only the verified event stream turns the row into an admission.
    let payload = br#"{
        "type": "payment_intent.succeeded",
        "data": {"object": {
            "id": "pi_fake",
            "metadata": {"customer_name": "Mallory", "customer_email": "mallory@example.com", "guest_count": "10"}
        }}
    }"#;
    let event = parse_webhook_event(payload).unwrap();
    ctl.reconcile_event(&event).await.unwrap();

    let rows = store.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payment_status, PaymentStatus::Completed);
    assert_eq!(capacity::admitted_guests(&rows), 10);
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn notification_failure_does_not_roll_back_the_admission() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    notifier.fail_all.store(true, Ordering::SeqCst);
    let ctl = controller(&store, &payments, &notifier);

    let (record, created) = ctl
        .record_admission(&guest("Ana", Some("5125550134")), 2, "pi_notify")
        .await
        .unwrap();
    assert!(created);
    assert_eq!(record.payment_status, PaymentStatus::Completed);

    let rows = store.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payment_intent_id.as_deref(), Some("pi_notify"));
    // Both channels were attempted despite failing.
    assert_eq!(notifier.email_sends.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.sms_sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refund_round_trip_and_double_refund_rejection() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let (record, _) = ctl
        .record_admission(&guest("Ana", None), 3, "pi_refund_me")
        .await
        .unwrap();

    let (updated, outcome) = ctl.refund(record.id, Some(12000), None).await.unwrap();
    assert_eq!(updated.payment_status, PaymentStatus::Refunded);
    assert_eq!(updated.refund_id.as_deref(), Some("re_mock_pi_refund_me"));
    assert_eq!(updated.refund_amount, Some(12000));
    assert_eq!(outcome.refunded_amount_cents, 12000);

    // A refunded row cannot be refunded again.
    let err = ctl.refund(record.id, None, None).await.unwrap_err();
    assert!(matches!(err, ApiError::NoRefundablePayment(_)));
    assert_eq!(payments.refund_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refund_requires_a_charge_ref() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let manual = store
        .create(NewRsvp {
            name: "Walk In".to_string(),
            email: "walkin@example.com".to_string(),
            phone: None,
            guests: 1,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
        })
        .await
        .unwrap();

    let err = ctl.refund(manual.id, None, None).await.unwrap_err();
    assert!(matches!(err, ApiError::NoRefundablePayment(_)));
    assert_eq!(payments.refund_calls.load(Ordering::SeqCst), 0);

    let err = ctl.refund(9999, None, None).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn delete_refunds_paid_rows_and_reports_the_outcome() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let (paid, _) = ctl
        .record_admission(&guest("Ana", None), 2, "pi_del_1")
        .await
        .unwrap();
    assert_eq!(
        ctl.delete_with_refund(paid.id).await.unwrap(),
        RefundStatus::Refunded
    );
    assert!(store.get(paid.id).await.unwrap().is_none());

    // Manual row with no charge: deleted, nothing to refund.
    let manual = store
        .create(NewRsvp {
            name: "Walk In".to_string(),
            email: "walkin@example.com".to_string(),
            phone: None,
            guests: 1,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
        })
        .await
        .unwrap();
    assert_eq!(
        ctl.delete_with_refund(manual.id).await.unwrap(),
        RefundStatus::NoPayment
    );
    assert!(store.get(manual.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_proceeds_when_the_refund_bridge_fails() {
    let store = MemoryStore::default();
    let payments = MockPayments::default();
    let notifier = MockNotifier::default();
    let ctl = controller(&store, &payments, &notifier);

    let (paid, _) = ctl
        .record_admission(&guest("Ana", None), 2, "pi_del_fail")
        .await
        .unwrap();

    payments.fail_refunds.store(true, Ordering::SeqCst);
    assert_eq!(
        ctl.delete_with_refund(paid.id).await.unwrap(),
        RefundStatus::RefundFailed
    );
    // The row is gone even though the refund did not go through.
    assert!(store.get(paid.id).await.unwrap().is_none());
}
