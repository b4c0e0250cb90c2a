//! Public order identifiers.
//!
//! * order code: `BPK-YYYYMMDD-XXXXXXXXXXXXX` (13 upper-case hex digits)
//! * tracking number: `TRKYYYYMMDDnnnnnnPK` (6 zero-padded digits)

use chrono::NaiveDateTime;
use rand::{thread_rng, Rng};

pub const ORDER_CODE_PREFIX: &str = "BPK-";
pub const TRACKING_PREFIX: &str = "TRK";
pub const TRACKING_SUFFIX: &str = "PK";
pub const ORDER_CODE_LEN: usize = 26;
pub const TRACKING_NUMBER_LEN: usize = 19;

const CODE_SUFFIX_MASK: u64 = (1 << 52) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIdentifiers {
    pub order_code: String,
    pub tracking_number: String,
}

/// Source of fresh identifiers for a checkout.
pub trait IdentifierSource: Send + Sync {
    fn mint(&self, at: NaiveDateTime) -> OrderIdentifiers;
}

/// Random identifiers stamped with the order date; collisions are caught by
/// the unique columns and retried by checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn mint(&self, at: NaiveDateTime) -> OrderIdentifiers {
        let mut rng = thread_rng();
        let date = at.format("%Y%m%d");
        OrderIdentifiers {
            order_code: format!(
                "{}{}-{:013X}",
                ORDER_CODE_PREFIX,
                date,
                rng.gen::<u64>() & CODE_SUFFIX_MASK
            ),
            tracking_number: format!(
                "{}{}{:06}{}",
                TRACKING_PREFIX,
                date,
                rng.gen_range(0..1_000_000u32),
                TRACKING_SUFFIX
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn order_code_shape() {
        let ids = RandomIdentifiers.mint(stamp());
        assert_eq!(ids.order_code.len(), ORDER_CODE_LEN);
        assert!(ids.order_code.starts_with("BPK-20261017-"));
        let suffix = &ids.order_code[13..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn tracking_number_shape() {
        let ids = RandomIdentifiers.mint(stamp());
        assert_eq!(ids.tracking_number.len(), TRACKING_NUMBER_LEN);
        assert!(ids.tracking_number.starts_with("TRK20261017"));
        assert!(ids.tracking_number.ends_with("PK"));
        assert!(ids.tracking_number[11..17].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn codes_and_tracking_numbers_never_overlap() {
        let ids = RandomIdentifiers.mint(stamp());
        assert_ne!(ids.order_code, ids.tracking_number);
        assert!(!ids.tracking_number.starts_with(ORDER_CODE_PREFIX));
        assert!(!ids.order_code.starts_with(TRACKING_PREFIX));
    }

    #[test]
    fn order_codes_are_practically_unique() {
        let codes: HashSet<_> = (0..10_000)
            .map(|_| RandomIdentifiers.mint(stamp()).order_code)
            .collect();
        assert_eq!(codes.len(), 10_000);
    }
}
