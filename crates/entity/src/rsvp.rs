use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per submitted party for the single event this deployment serves.
///
/// A row only counts toward the guest cap when `payment_status` is
/// `completed` AND `payment_intent_id` is set; rows without a payment ref
/// are manually-inserted (test or comped) entries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "rsvps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub name: String,

    pub email: String,

    pub phone: Option<String>,

    /// Party size, 1..=10 at submission time. Fixed at creation; only the
    /// admin override path may change it afterwards.
    pub guests: i32,

    pub payment_status: PaymentStatus,

    /// External charge identifier (Stripe payment intent id).
    pub payment_intent_id: Option<String>,

    /// Set only when `payment_status` is `refunded`.
    pub refund_id: Option<String>,

    /// Refunded amount in cents. Set only on refund.
    pub refund_amount: Option<i64>,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds). Bumped on every mutation.
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
