use async_trait::async_trait;
use entity::rsvp::{self, PaymentStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::util::now_ts;

#[derive(Debug, Clone)]
pub struct NewRsvp {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub guests: i32,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
}

/// Partial update. `phone` and `payment_intent_id` use a double Option so
/// the admin edit path can distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct RsvpPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub guests: Option<i32>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_intent_id: Option<Option<String>>,
    pub refund_id: Option<String>,
    pub refund_amount: Option<i64>,
}

/// The one-table persistence boundary. Capacity is enforced by the
/// lifecycle controller, not here; every write is single-row.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, new: NewRsvp) -> Result<rsvp::Model, DbErr>;

    async fn get(&self, id: i64) -> Result<Option<rsvp::Model>, DbErr>;

    /// Lookup by external charge ref; the idempotency key for async
    /// payment-event reconciliation.
    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<rsvp::Model>, DbErr>;

    /// All records, newest first.
    async fn list_all(&self) -> Result<Vec<rsvp::Model>, DbErr>;

    /// Applies the patch and bumps `updated_at`. `None` when the id is
    /// unknown.
    async fn update(&self, id: i64, patch: RsvpPatch) -> Result<Option<rsvp::Model>, DbErr>;

    /// `false` when the id is unknown.
    async fn delete(&self, id: i64) -> Result<bool, DbErr>;
}

#[derive(Clone)]
pub struct SeaStore {
    db: DatabaseConnection,
}

impl SeaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaStore {
    async fn create(&self, new: NewRsvp) -> Result<rsvp::Model, DbErr> {
        let now = now_ts();
        let active = rsvp::ActiveModel {
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            guests: Set(new.guests),
            payment_status: Set(new.payment_status),
            payment_intent_id: Set(new.payment_intent_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active.insert(&self.db).await
    }

    async fn get(&self, id: i64) -> Result<Option<rsvp::Model>, DbErr> {
        rsvp::Entity::find_by_id(id).one(&self.db).await
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Option<rsvp::Model>, DbErr> {
        rsvp::Entity::find()
            .filter(rsvp::Column::PaymentIntentId.eq(payment_ref))
            .one(&self.db)
            .await
    }

    async fn list_all(&self) -> Result<Vec<rsvp::Model>, DbErr> {
        rsvp::Entity::find()
            .order_by_desc(rsvp::Column::CreatedAt)
            .order_by_desc(rsvp::Column::Id)
            .all(&self.db)
            .await
    }

    async fn update(&self, id: i64, patch: RsvpPatch) -> Result<Option<rsvp::Model>, DbErr> {
        let Some(found) = rsvp::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: rsvp::ActiveModel = found.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(email) = patch.email {
            active.email = Set(email);
        }
        if let Some(phone) = patch.phone {
            active.phone = Set(phone);
        }
        if let Some(guests) = patch.guests {
            active.guests = Set(guests);
        }
        if let Some(status) = patch.payment_status {
            active.payment_status = Set(status);
        }
        if let Some(payment_intent_id) = patch.payment_intent_id {
            active.payment_intent_id = Set(payment_intent_id);
        }
        if let Some(refund_id) = patch.refund_id {
            active.refund_id = Set(Some(refund_id));
        }
        if let Some(refund_amount) = patch.refund_amount {
            active.refund_amount = Set(Some(refund_amount));
        }
        active.updated_at = Set(now_ts());

        active.update(&self.db).await.map(Some)
    }

    async fn delete(&self, id: i64) -> Result<bool, DbErr> {
        let res = rsvp::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }
}
