use crate::entity::order::OrderStatus;
use chrono::NaiveDateTime;
use serde::Serialize;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One stage of an order's progress as shown to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub status: &'static str,
    pub date: String,
    pub description: &'static str,
    pub completed: bool,
    pub current: bool,
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Derive the four-stage timeline from the current status alone. Only the
/// placement and delivery stages carry dates; nothing records when the
/// intermediate stages were reached.
pub fn build(
    status: OrderStatus,
    ordered_at: NaiveDateTime,
    delivered_at: Option<NaiveDateTime>,
) -> Vec<Milestone> {
    let processing = status == OrderStatus::Processing;
    let shipped = status == OrderStatus::Shipped;
    let delivered = status == OrderStatus::Delivered;
    vec![
        Milestone {
            status: "Order Placed",
            date: format_timestamp(ordered_at),
            description: "Your order has been placed.",
            completed: true,
            current: false,
        },
        Milestone {
            status: "Processing",
            date: String::new(),
            description: "Your order is being processed.",
            completed: !processing,
            current: processing,
        },
        Milestone {
            status: "Shipped",
            date: String::new(),
            description: "Your order has been shipped.",
            completed: shipped || delivered,
            current: shipped,
        },
        Milestone {
            status: "Delivered",
            date: delivered_at.map(format_timestamp).unwrap_or_default(),
            description: "Your order has been delivered.",
            completed: delivered,
            current: delivered,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn flags(timeline: &[Milestone]) -> Vec<(bool, bool)> {
        timeline.iter().map(|m| (m.completed, m.current)).collect()
    }

    #[test]
    fn processing_order() {
        let timeline = build(OrderStatus::Processing, at(9), None);
        assert_eq!(
            timeline.iter().map(|m| m.status).collect::<Vec<_>>(),
            ["Order Placed", "Processing", "Shipped", "Delivered"]
        );
        assert_eq!(
            flags(&timeline),
            [(true, false), (false, true), (false, false), (false, false)]
        );
        assert_eq!(timeline[0].date, "2026-10-17 09:00:00");
        assert!(timeline[1..].iter().all(|m| m.date.is_empty()));
    }

    #[test]
    fn shipped_order() {
        let timeline = build(OrderStatus::Shipped, at(9), None);
        assert_eq!(
            flags(&timeline),
            [(true, false), (true, false), (false, true), (false, false)]
        );
    }

    #[test]
    fn delivered_order_is_dated() {
        let timeline = build(OrderStatus::Delivered, at(9), Some(at(15)));
        assert_eq!(
            flags(&timeline),
            [(true, false), (true, false), (true, false), (true, true)]
        );
        assert_eq!(timeline[3].date, "2026-10-17 15:00:00");
    }

    #[test]
    fn delivered_without_timestamp_has_blank_date() {
        let timeline = build(OrderStatus::Delivered, at(9), None);
        assert_eq!(timeline[3].date, "");
    }

    #[test]
    fn cancelled_order_has_no_current_stage() {
        let timeline = build(OrderStatus::Cancelled, at(9), None);
        assert_eq!(
            flags(&timeline),
            [(true, false), (true, false), (false, false), (false, false)]
        );
    }

    #[test]
    fn only_delivered_is_both_completed_and_current() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let timeline = build(status, at(9), Some(at(10)));
            for milestone in &timeline[..3] {
                assert!(!(milestone.completed && milestone.current), "{status:?}");
            }
        }
    }
}
