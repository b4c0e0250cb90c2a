use chrono::{Duration, NaiveDateTime};
use sea_orm::{entity::prelude::*, ActiveValue::NotSet, Set};
use serde::{Deserialize, Serialize};

/// Days between placing an order and its estimated delivery.
pub const DELIVERY_LEAD_DAYS: i64 = 3;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,
    #[sea_orm(unique)]
    pub order_code: String,
    #[sea_orm(unique)]
    pub tracking_number: String,
    #[sea_orm(nullable)]
    pub user_id: Option<i64>,
    pub user_name: String,
    #[sea_orm(indexed)]
    pub user_email: String,
    pub user_phone: String,
    pub user_address: String,
    pub user_city: String,
    pub user_country: String,
    pub shipping_method: ShippingMethod,
    pub payment_method: String,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub estimated_delivery: Date,
    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTime>,
    pub ordered_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// A fresh `processing` header stamped at `ordered_at`; identifiers, buyer
    /// and money columns are filled in by the caller.
    pub fn new(ordered_at: NaiveDateTime) -> Self {
        Self {
            id: NotSet,
            order_code: NotSet,
            tracking_number: NotSet,
            user_id: NotSet,
            user_name: NotSet,
            user_email: NotSet,
            user_phone: NotSet,
            user_address: NotSet,
            user_city: NotSet,
            user_country: NotSet,
            shipping_method: NotSet,
            payment_method: NotSet,
            status: Set(OrderStatus::Processing),
            subtotal: NotSet,
            shipping: NotSet,
            tax: NotSet,
            total: NotSet,
            estimated_delivery: Set(ordered_at.date() + Duration::days(DELIVERY_LEAD_DAYS)),
            delivered_at: Set(None),
            ordered_at: Set(ordered_at),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "express")]
    Express,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Capitalized label shown next to the raw status.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}
