//! Pure capacity accounting for the one event this deployment serves.
//!
//! The gate is recomputed from a fresh record listing immediately before a
//! charge is authorized, never from a cached count. The check-then-authorize
//! window is still not atomic against the store, so N simultaneous
//! submissions can oversell by up to (N-1) x MAX_PARTY_SIZE; at a few
//! hundred human-paced submissions that risk is accepted rather than paid
//! for with a serializing reservation step.

use entity::rsvp::{self, PaymentStatus};

use crate::error::ApiError;

pub const GUEST_LIMIT: i64 = 80;
pub const MIN_PARTY_SIZE: i32 = 1;
pub const MAX_PARTY_SIZE: i32 = 10;

/// Per-guest ticket price. One canonical value; do not merge the divergent
/// per-deployment figures floating around older front-end builds.
pub const UNIT_PRICE_CENTS: i64 = 4000;
pub const CURRENCY: &str = "usd";

/// A row holds guest spots only when it is completed AND carries a charge
/// ref. Manually-inserted rows never count.
pub fn counts_toward_cap(record: &rsvp::Model) -> bool {
    record.payment_status == PaymentStatus::Completed && record.payment_intent_id.is_some()
}

pub fn admitted_guests(records: &[rsvp::Model]) -> i64 {
    records
        .iter()
        .filter(|r| counts_toward_cap(r))
        .map(|r| i64::from(r.guests))
        .sum()
}

pub fn remaining_spots(records: &[rsvp::Model]) -> i64 {
    GUEST_LIMIT - admitted_guests(records)
}

pub fn check_party_size(guests: i32) -> Result<(), ApiError> {
    if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&guests) {
        return Err(ApiError::Validation(format!(
            "guests must be between {MIN_PARTY_SIZE} and {MAX_PARTY_SIZE}"
        )));
    }
    Ok(())
}

pub fn can_admit(requested: i32, remaining: i64) -> Result<(), ApiError> {
    check_party_size(requested)?;
    if i64::from(requested) > remaining {
        return Err(ApiError::CapacityExceeded {
            remaining: remaining.max(0),
            limit: GUEST_LIMIT,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(guests: i32, status: PaymentStatus, payment_ref: Option<&str>) -> rsvp::Model {
        rsvp::Model {
            id: 0,
            name: "Guest".to_string(),
            email: "guest@example.com".to_string(),
            phone: None,
            guests,
            payment_status: status,
            payment_intent_id: payment_ref.map(str::to_string),
            refund_id: None,
            refund_amount: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn only_completed_and_paid_rows_count() {
        let records = vec![
            record(4, PaymentStatus::Completed, Some("pi_1")),
            record(3, PaymentStatus::Completed, None),
            record(5, PaymentStatus::Pending, Some("pi_2")),
            record(2, PaymentStatus::Refunded, Some("pi_3")),
            record(6, PaymentStatus::Failed, None),
        ];
        assert_eq!(admitted_guests(&records), 4);
        assert_eq!(remaining_spots(&records), 76);
    }

    #[test]
    fn party_size_bounds() {
        assert!(check_party_size(0).is_err());
        assert!(check_party_size(11).is_err());
        assert!(check_party_size(-3).is_err());
        assert!(check_party_size(1).is_ok());
        assert!(check_party_size(10).is_ok());
    }

    #[test]
    fn rejects_when_request_exceeds_remaining() {
        // 78 admitted, 2 remaining.
        let err = can_admit(5, 2).unwrap_err();
        assert!(matches!(
            err,
            ApiError::CapacityExceeded { remaining: 2, limit: GUEST_LIMIT }
        ));

        assert!(can_admit(2, 2).is_ok());
        // Once full, everything is rejected.
        assert!(can_admit(1, 0).is_err());
    }

    #[test]
    fn negative_remaining_is_reported_as_zero() {
        let err = can_admit(1, -3).unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded { remaining: 0, .. }));
    }
}
