use crate::entity::order::{self, OrderStatus, ShippingMethod};
use crate::error::{OrderError, OrderResult};
use crate::pricing::{from_stored, round_money, to_f64};
use crate::repository::{BuyerQuery, OrderRepository};
use crate::timeline::{self, format_timestamp, Milestone};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedItem {
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

/// Everything the tracking page shows for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: String,
    pub status: OrderStatus,
    pub status_text: &'static str,
    pub delivery_date: String,
    pub carrier: ShippingMethod,
    pub tracking_number: String,
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub items: Vec<TrackedItem>,
    pub timeline: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub order_id: String,
    pub date: String,
    pub items: usize,
    pub total: f64,
    pub status: OrderStatus,
    pub status_text: &'static str,
    pub tracking_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderHistory {
    pub orders: Vec<HistoryEntry>,
    pub total_spent: Decimal,
    pub average_order: Decimal,
}

impl OrderHistory {
    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }
}

/// Build the history key from request parameters; email wins over user id.
pub fn buyer_query(user_id: Option<i64>, email: Option<&str>) -> OrderResult<BuyerQuery> {
    match (email.map(str::trim).filter(|e| !e.is_empty()), user_id) {
        (Some(email), _) => Ok(BuyerQuery::Email(email.to_owned())),
        (None, Some(user_id)) => Ok(BuyerQuery::UserId(user_id)),
        (None, None) => Err(OrderError::validation("User ID or email is required")),
    }
}

#[derive(Debug, Clone)]
pub struct OrderLookup {
    repository: OrderRepository,
}

impl OrderLookup {
    pub fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }

    /// Resolve an order code or tracking number. With an email, the order
    /// must belong to that buyer.
    pub async fn track(&self, identifier: &str, email: Option<&str>) -> OrderResult<TrackingView> {
        let identifier = identifier.trim().to_uppercase();
        if identifier.is_empty() {
            return Err(OrderError::validation("Order ID is required"));
        }
        let order = self.repository.find_order(&identifier).await?;

        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            if !order.user_email.trim().eq_ignore_ascii_case(email) {
                tracing::info!(order_code = %order.order_code, "tracking email does not match order");
                return Err(OrderError::OwnershipMismatch(identifier));
            }
        }

        let items = self
            .repository
            .list_items(order.id)
            .await?
            .into_iter()
            .map(|item| TrackedItem {
                name: item.name,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        Ok(tracking_view(order, items))
    }

    /// All orders of a buyer, newest first, with spend aggregates.
    pub async fn history(&self, query: &BuyerQuery) -> OrderResult<OrderHistory> {
        let orders = self.repository.orders_for_buyer(query).await?;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let counts = self.repository.item_counts(&ids).await?;

        let total_spent: Decimal = orders.iter().map(|o| from_stored(o.total)).sum();
        let average_order = if orders.is_empty() {
            Decimal::ZERO
        } else {
            round_money(total_spent / Decimal::from(orders.len()))
        };
        let orders = orders
            .into_iter()
            .map(|o| HistoryEntry {
                items: counts.get(&o.id).copied().unwrap_or(0),
                date: format_timestamp(o.ordered_at),
                total: to_f64(from_stored(o.total)),
                status: o.status,
                status_text: o.status.label(),
                tracking_number: o.tracking_number,
                order_id: o.order_code,
            })
            .collect();
        Ok(OrderHistory {
            orders,
            total_spent,
            average_order,
        })
    }
}

fn tracking_view(order: order::Model, items: Vec<TrackedItem>) -> TrackingView {
    TrackingView {
        timeline: timeline::build(order.status, order.ordered_at, order.delivered_at),
        status_text: order.status.label(),
        status: order.status,
        delivery_date: order.estimated_delivery.format("%Y-%m-%d").to_string(),
        carrier: order.shipping_method,
        subtotal: to_f64(from_stored(order.subtotal)),
        shipping: to_f64(from_stored(order.shipping)),
        tax: to_f64(from_stored(order.tax)),
        total: to_f64(from_stored(order.total)),
        order_id: order.order_code,
        tracking_number: order.tracking_number,
        items,
    }
}
