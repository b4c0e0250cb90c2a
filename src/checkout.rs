use crate::entity::order::{self, OrderStatus, ShippingMethod};
use crate::error::{OrderError, OrderResult};
use crate::identifier::{IdentifierSource, RandomIdentifiers};
use crate::pricing::{price_cart, CartLine, PriceSummary};
use crate::repository::{OrderHeader, OrderRepository};
use chrono::{Local, NaiveDate, NaiveDateTime};
use fakeit::{address, hipster, name};
use rand::{thread_rng, Rng};
use serde::Deserialize;

/// Attempts at minting identifiers before a checkout gives up on conflicts.
pub const MAX_IDENTIFIER_ATTEMPTS: u32 = 3;

const DEFAULT_PAYMENT_METHOD: &str = "cod";

/// Buyer details copied onto the order at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Buyer {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

impl Buyer {
    fn validate(&self) -> OrderResult<()> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("address", &self.address),
            ("city", &self.city),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::Validation(format!(
                    "Missing required field: {field}"
                )));
            }
        }
        if !self.email.contains('@') {
            return Err(OrderError::validation("Invalid email address"));
        }
        Ok(())
    }

    fn trimmed(self) -> Self {
        Self {
            id: self.id,
            name: self.name.trim().to_owned(),
            email: self.email.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            address: self.address.trim().to_owned(),
            city: self.city.trim().to_owned(),
            country: self.country.trim().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShippingChoice {
    pub method: ShippingMethod,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentChoice {
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    pub cart: Vec<CartLine>,
    pub user: Buyer,
    pub shipping: ShippingChoice,
    pub payment: PaymentChoice,
}

impl CheckoutRequest {
    /// A plausible random checkout, used to seed and load-test the store.
    pub fn rand_fake_new() -> Self {
        let mut rng = thread_rng();
        let cart = (0..rng.gen_range(1..=4))
            .map(|_| {
                CartLine::new(
                    Some(rng.gen_range(1..=500)),
                    hipster::word(),
                    f64::from(rng.gen_range(100..50_000u32)) / 100.0,
                    rng.gen_range(1..=5),
                )
            })
            .collect();
        let first = name::first();
        let last = name::last();
        Self {
            cart,
            user: Buyer {
                id: Some(rng.gen_range(1..=10_000)),
                name: format!("{first} {last}"),
                email: format!("{}.{}@example.com", first, last).to_lowercase(),
                phone: format!("555-{:04}", rng.gen_range(0..10_000)),
                address: address::street(),
                city: address::city(),
                country: address::country(),
            },
            shipping: ShippingChoice {
                method: if rng.gen_bool(0.3) {
                    ShippingMethod::Express
                } else {
                    ShippingMethod::Standard
                },
            },
            payment: PaymentChoice {
                method: Some(if rng.gen_bool(0.5) { "card" } else { "cod" }.to_owned()),
            },
        }
    }
}

/// What a successful checkout hands back to the buyer.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub order_code: String,
    pub tracking_number: String,
    pub summary: PriceSummary,
    pub status: OrderStatus,
    pub estimated_delivery: NaiveDate,
    pub ordered_at: NaiveDateTime,
}

impl Receipt {
    fn new(order: order::Model, summary: PriceSummary) -> Self {
        Self {
            order_code: order.order_code,
            tracking_number: order.tracking_number,
            summary,
            status: order.status,
            estimated_delivery: order.estimated_delivery,
            ordered_at: order.ordered_at,
        }
    }
}

pub struct CheckoutService<I = RandomIdentifiers> {
    repository: OrderRepository,
    identifiers: I,
}

impl CheckoutService<RandomIdentifiers> {
    pub fn new(repository: OrderRepository) -> Self {
        Self::with_identifiers(repository, RandomIdentifiers)
    }
}

impl<I: IdentifierSource> CheckoutService<I> {
    pub fn with_identifiers(repository: OrderRepository, identifiers: I) -> Self {
        Self {
            repository,
            identifiers,
        }
    }

    /// Price the cart, mint identifiers and store the order. Identifier
    /// conflicts are retried with fresh identifiers.
    pub async fn place_order(&self, request: CheckoutRequest) -> OrderResult<Receipt> {
        let CheckoutRequest {
            cart,
            user,
            shipping,
            payment,
        } = request;
        user.validate()?;
        let summary = price_cart(&cart, shipping.method)?;
        let buyer = user.trimmed();
        let payment_method = payment
            .method
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned());

        let mut attempt = 1;
        loop {
            let ordered_at = Local::now().naive_local();
            let header = OrderHeader {
                identifiers: self.identifiers.mint(ordered_at),
                buyer: buyer.clone(),
                shipping_method: shipping.method,
                payment_method: payment_method.clone(),
                summary,
                ordered_at,
            };
            match self.repository.create_order(header, &cart).await {
                Ok(order) => {
                    tracing::info!(
                        order_code = %order.order_code,
                        items = cart.len(),
                        total = %summary.total,
                        "order placed"
                    );
                    return Ok(Receipt::new(order, summary));
                }
                Err(OrderError::Conflict(detail)) if attempt < MAX_IDENTIFIER_ATTEMPTS => {
                    tracing::warn!(attempt, %detail, "order identifier collision, minting new identifiers");
                    attempt += 1;
                }
                Err(OrderError::Conflict(detail)) => {
                    tracing::error!(attempt, %detail, "order identifiers kept colliding");
                    return Err(OrderError::Conflict(detail));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{memory_db, order_item};
    use crate::identifier::OrderIdentifiers;
    use rust_decimal::Decimal;
    use sea_orm::{EntityTrait, PaginatorTrait};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Hands out a fixed sequence of identifiers.
    struct Scripted(Mutex<VecDeque<(&'static str, &'static str)>>);

    impl Scripted {
        fn new(ids: &[(&'static str, &'static str)]) -> Self {
            Self(Mutex::new(ids.iter().copied().collect()))
        }
    }

    impl IdentifierSource for Scripted {
        fn mint(&self, _at: NaiveDateTime) -> OrderIdentifiers {
            let (code, tracking) = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted");
            OrderIdentifiers {
                order_code: code.into(),
                tracking_number: tracking.into(),
            }
        }
    }

    fn request(email: &str, cart: Vec<CartLine>, method: ShippingMethod) -> CheckoutRequest {
        CheckoutRequest {
            cart,
            user: Buyer {
                id: None,
                name: "Grace Hopper".into(),
                email: email.into(),
                phone: String::new(),
                address: "1 Compiler Way".into(),
                city: "Arlington".into(),
                country: "US".into(),
            },
            shipping: ShippingChoice { method },
            payment: PaymentChoice::default(),
        }
    }

    async fn repository() -> OrderRepository {
        OrderRepository::new(memory_db().await, Duration::from_secs(5))
    }

    async fn row_counts(repo: &OrderRepository) -> (u64, u64) {
        (
            order::Entity::find().count(repo.connection()).await.unwrap(),
            order_item::Entity::find().count(repo.connection()).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn places_priced_order() {
        let repo = repository().await;
        let service = CheckoutService::new(repo.clone());
        let cart = vec![CartLine::new(Some(1), "Phone", 200.00, 1)];
        let receipt = service
            .place_order(request("grace@example.com", cart, ShippingMethod::Standard))
            .await
            .unwrap();

        assert_eq!(receipt.summary.total, Decimal::new(22199, 2));
        assert_eq!(receipt.status, OrderStatus::Processing);
        assert!(receipt.order_code.starts_with("BPK-"));
        assert!(receipt.tracking_number.starts_with("TRK"));
        assert_eq!(
            receipt.estimated_delivery,
            receipt.ordered_at.date() + chrono::Duration::days(3)
        );

        let stored = repo.find_order(&receipt.order_code).await.unwrap();
        assert_eq!(stored.payment_method, "cod");
        assert_eq!(stored.shipping_method, ShippingMethod::Standard);
        assert_eq!(stored.user_phone, "");
        assert_eq!(row_counts(&repo).await, (1, 1));
    }

    #[tokio::test]
    async fn fake_checkouts_are_valid() {
        let repo = repository().await;
        let service = CheckoutService::new(repo.clone());
        for _ in 0..5 {
            service
                .place_order(CheckoutRequest::rand_fake_new())
                .await
                .unwrap();
        }
        assert_eq!(order::Entity::find().count(repo.connection()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn empty_cart_persists_nothing() {
        let repo = repository().await;
        let service = CheckoutService::new(repo.clone());
        let err = service
            .place_order(request("grace@example.com", vec![], ShippingMethod::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(row_counts(&repo).await, (0, 0));
    }

    #[tokio::test]
    async fn bad_cart_line_persists_nothing() {
        let repo = repository().await;
        let service = CheckoutService::new(repo.clone());
        for line in [
            CartLine::new(Some(1), "Zero", 10.0, 0),
            CartLine::new(Some(1), "Negative", -1.0, 1),
            CartLine::new(Some(1), "Yacht", 1e30, 1),
            CartLine::new(Some(1), "Bulk", 5e28, i32::MAX),
        ] {
            let cart = vec![CartLine::new(Some(2), "Fine", 1.0, 1), line];
            let err = service
                .place_order(request("grace@example.com", cart, ShippingMethod::Express))
                .await
                .unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)));
        }
        assert_eq!(row_counts(&repo).await, (0, 0));
    }

    #[tokio::test]
    async fn missing_buyer_field_is_named() {
        let repo = repository().await;
        let service = CheckoutService::new(repo.clone());
        let mut req = request(
            "grace@example.com",
            vec![CartLine::new(Some(1), "Phone", 200.00, 1)],
            ShippingMethod::Standard,
        );
        req.user.city = "  ".into();
        let err = service.place_order(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: city");
        assert_eq!(row_counts(&repo).await, (0, 0));
    }

    #[tokio::test]
    async fn identifier_collision_is_retried_with_fresh_identifiers() {
        let repo = repository().await;
        let service = CheckoutService::with_identifiers(
            repo.clone(),
            Scripted::new(&[
                ("BPK-A", "TRK-A"),
                ("BPK-A", "TRK-B"),
                ("BPK-B", "TRK-A"),
                ("BPK-C", "TRK-C"),
            ]),
        );
        let cart = || vec![CartLine::new(Some(2), "Cable", 9.99, 3)];

        let first = service
            .place_order(request("a@example.com", cart(), ShippingMethod::Express))
            .await
            .unwrap();
        assert_eq!(first.order_code, "BPK-A");

        let second = service
            .place_order(request("b@example.com", cart(), ShippingMethod::Express))
            .await
            .unwrap();
        assert_eq!(second.order_code, "BPK-C");
        assert_eq!(second.tracking_number, "TRK-C");
        assert_eq!(row_counts(&repo).await, (2, 2));
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let repo = repository().await;
        let service = CheckoutService::with_identifiers(
            repo.clone(),
            Scripted::new(&[
                ("BPK-A", "TRK-A"),
                ("BPK-A", "TRK-1"),
                ("BPK-A", "TRK-2"),
                ("BPK-A", "TRK-3"),
            ]),
        );
        let cart = || vec![CartLine::new(Some(1), "Phone", 200.00, 1)];
        service
            .place_order(request("a@example.com", cart(), ShippingMethod::Standard))
            .await
            .unwrap();
        let err = service
            .place_order(request("b@example.com", cart(), ShippingMethod::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Conflict(_)));
        assert_eq!(row_counts(&repo).await, (1, 1));
    }

    #[test]
    fn shipping_defaults_to_standard() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "cart": [{ "id": 1, "name": "Phone", "price": 200.0, "quantity": 1 }],
            "user": { "name": "Grace Hopper", "email": "grace@example.com" }
        }))
        .unwrap();
        assert_eq!(request.shipping.method, ShippingMethod::Standard);
        assert_eq!(ShippingMethod::default(), ShippingMethod::Standard);
    }
}
