use crate::checkout::Buyer;
use crate::entity::order::{self, OrderStatus, ShippingMethod};
use crate::entity::order_item;
use crate::error::{OrderError, OrderResult};
use crate::identifier::OrderIdentifiers;
use crate::pricing::{to_f64, CartLine, PriceSummary};
use chrono::{Local, NaiveDateTime};
use futures::Future;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::collections::HashMap;
use std::time::Duration;

/// Everything checkout knows about an order before it is stored.
#[derive(Debug, Clone)]
pub struct OrderHeader {
    pub identifiers: OrderIdentifiers,
    pub buyer: Buyer,
    pub shipping_method: ShippingMethod,
    pub payment_method: String,
    pub summary: PriceSummary,
    pub ordered_at: NaiveDateTime,
}

impl OrderHeader {
    fn into_active_model(self) -> order::ActiveModel {
        let mut active = order::ActiveModel::new(self.ordered_at);
        active.order_code = Set(self.identifiers.order_code);
        active.tracking_number = Set(self.identifiers.tracking_number);
        active.user_id = Set(self.buyer.id);
        active.user_name = Set(self.buyer.name);
        active.user_email = Set(self.buyer.email);
        active.user_phone = Set(self.buyer.phone);
        active.user_address = Set(self.buyer.address);
        active.user_city = Set(self.buyer.city);
        active.user_country = Set(self.buyer.country);
        active.shipping_method = Set(self.shipping_method);
        active.payment_method = Set(self.payment_method);
        active.subtotal = Set(to_f64(self.summary.subtotal));
        active.shipping = Set(to_f64(self.summary.shipping));
        active.tax = Set(to_f64(self.summary.tax));
        active.total = Set(to_f64(self.summary.total));
        active
    }
}

/// Whose orders a history request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerQuery {
    Email(String),
    UserId(i64),
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl OrderRepository {
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn bounded<T, F>(&self, work: F) -> OrderResult<T>
    where
        F: Future<Output = OrderResult<T>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "order database call timed out");
                Err(OrderError::Timeout(self.timeout))
            }
        }
    }

    /// Store the header and all of its items in one transaction. Nothing is
    /// left behind when any insert fails.
    pub async fn create_order(
        &self,
        header: OrderHeader,
        items: &[CartLine],
    ) -> OrderResult<order::Model> {
        if items.is_empty() {
            return Err(OrderError::validation("An order needs at least one item"));
        }
        let header_active = header.into_active_model();
        let items = items.to_vec();
        self.bounded(async {
            self.db
                .transaction::<_, order::Model, DbErr>(|txn| {
                    Box::pin(async move {
                        let inserted = header_active.insert(txn).await?;
                        for line in items {
                            order_item::ActiveModel::new(
                                inserted.id,
                                line.product_id,
                                line.name,
                                line.quantity,
                                line.unit_price,
                            )
                            .insert(txn)
                            .await?;
                        }
                        Ok(inserted)
                    })
                })
                .await
                .map_err(|err| match err {
                    TransactionError::Connection(err) => err,
                    TransactionError::Transaction(err) => err,
                })
                .map_err(OrderError::from_write)
        })
        .await
    }

    /// Exact match on either the order code or the tracking number.
    pub async fn find_order(&self, identifier: &str) -> OrderResult<order::Model> {
        self.bounded(async {
            order::Entity::find()
                .filter(
                    Condition::any()
                        .add(order::Column::OrderCode.eq(identifier))
                        .add(order::Column::TrackingNumber.eq(identifier)),
                )
                .one(&self.db)
                .await?
                .ok_or_else(|| OrderError::NotFound(identifier.to_owned()))
        })
        .await
    }

    /// Items of one order in insertion order.
    pub async fn list_items(&self, order_id: i64) -> OrderResult<Vec<order_item::Model>> {
        self.bounded(async {
            Ok(order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .order_by_asc(order_item::Column::Id)
                .all(&self.db)
                .await?)
        })
        .await
    }

    /// Orders of one buyer, most recent first. Emails match case-insensitively.
    pub async fn orders_for_buyer(&self, query: &BuyerQuery) -> OrderResult<Vec<order::Model>> {
        let condition = match query {
            BuyerQuery::Email(email) => Condition::all().add(
                Expr::expr(Func::lower(Expr::col(order::Column::UserEmail)))
                    .eq(email.trim().to_ascii_lowercase()),
            ),
            BuyerQuery::UserId(user_id) => {
                Condition::all().add(order::Column::UserId.eq(*user_id))
            }
        };
        self.bounded(async {
            Ok(order::Entity::find()
                .filter(condition)
                .order_by_desc(order::Column::OrderedAt)
                .order_by_desc(order::Column::Id)
                .all(&self.db)
                .await?)
        })
        .await
    }

    /// Number of line items for each of the given orders.
    pub async fn item_counts(&self, order_ids: &[i64]) -> OrderResult<HashMap<i64, usize>> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.bounded(async {
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids.to_vec()))
                .all(&self.db)
                .await?;
            let mut counts = HashMap::new();
            for item in items {
                *counts.entry(item.order_id).or_insert(0) += 1;
            }
            Ok(counts)
        })
        .await
    }

    /// Every order, most recent first.
    pub async fn list_orders(&self) -> OrderResult<Vec<order::Model>> {
        self.bounded(async {
            Ok(order::Entity::find()
                .order_by_desc(order::Column::OrderedAt)
                .order_by_desc(order::Column::Id)
                .all(&self.db)
                .await?)
        })
        .await
    }

    /// Move an order to `status`. Delivered and cancelled orders are final;
    /// reaching delivered stamps `delivered_at`.
    pub async fn update_status(
        &self,
        order_code: &str,
        status: OrderStatus,
    ) -> OrderResult<order::Model> {
        self.bounded(async {
            let current = order::Entity::find()
                .filter(order::Column::OrderCode.eq(order_code))
                .one(&self.db)
                .await?
                .ok_or_else(|| OrderError::NotFound(order_code.to_owned()))?;
            self.transition(current, status).await
        })
        .await
    }

    /// Write `status` over `current`, but only while the stored status is
    /// still the one `current` was read with.
    async fn transition(
        &self,
        current: order::Model,
        status: OrderStatus,
    ) -> OrderResult<order::Model> {
        if current.status == status {
            return Err(OrderError::Validation(format!(
                "Order is already {}",
                status.as_str()
            )));
        }
        if current.status.is_terminal() {
            return Err(OrderError::Validation(format!(
                "Order is {} and can no longer change",
                current.status.as_str()
            )));
        }
        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(status.into_value()))
            .filter(order::Column::Id.eq(current.id))
            .filter(order::Column::Status.eq(current.status.into_value()));
        if status == OrderStatus::Delivered {
            update = update.col_expr(
                order::Column::DeliveredAt,
                Expr::value(Some(Local::now().naive_local())),
            );
        }
        if update.exec(&self.db).await?.rows_affected == 0 {
            return Err(OrderError::Validation(format!(
                "Order {} changed status while updating, try again",
                current.order_code
            )));
        }
        order::Entity::find_by_id(current.id)
            .one(&self.db)
            .await?
            .ok_or(OrderError::NotFound(current.order_code))
    }
}
