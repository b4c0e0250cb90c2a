//! Cart pricing.
//!
//! Amounts arrive and leave as `f64`; every sum and product in between is
//! done on `Decimal` and rounded to cents, half away from zero.

use crate::entity::order::ShippingMethod;
use crate::error::{OrderError, OrderResult};
use rust_decimal::prelude::*;
use serde::Deserialize;

const DECIMAL_PLACES: u32 = 2;

/// Flat shipping for standard delivery (5.99).
pub const STANDARD_SHIPPING: Decimal = Decimal::from_parts(599, 0, 0, false, 2);
/// Flat shipping for express delivery (9.99).
pub const EXPRESS_SHIPPING: Decimal = Decimal::from_parts(999, 0, 0, false, 2);
/// Sales tax applied to the subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);
/// Highest unit price a cart line may carry.
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Highest quantity a cart line may carry.
pub const MAX_QUANTITY: i32 = 9999;

/// One product entry of a client-held cart.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id", default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub quantity: i32,
    #[serde(rename = "price")]
    pub unit_price: f64,
}

impl CartLine {
    pub fn new(product_id: Option<i64>, name: impl Into<String>, unit_price: f64, quantity: i32) -> Self {
        Self {
            product_id,
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// `None` when the price has no `Decimal` form or the product overflows.
    pub fn line_total(&self) -> Option<Decimal> {
        Decimal::from_f64(self.unit_price)?.checked_mul(Decimal::from(self.quantity))
    }
}

/// Monetary totals of a priced cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round_money(value).to_f64().unwrap_or_default()
}

/// Read a stored amount back as cents-exact `Decimal`.
#[inline]
pub fn from_stored(value: f64) -> Decimal {
    round_money(to_decimal(value))
}

pub fn shipping_cost(method: ShippingMethod) -> Decimal {
    match method {
        ShippingMethod::Standard => STANDARD_SHIPPING,
        ShippingMethod::Express => EXPRESS_SHIPPING,
    }
}

fn validate_line(index: usize, line: &CartLine) -> OrderResult<()> {
    if line.quantity <= 0 {
        return Err(OrderError::Validation(format!(
            "Cart item {} has invalid quantity {}",
            index + 1,
            line.quantity
        )));
    }
    if !line.unit_price.is_finite() {
        return Err(OrderError::Validation(format!(
            "Cart item {} price must be a finite number",
            index + 1
        )));
    }
    if line.unit_price < 0.0 {
        return Err(OrderError::Validation(format!(
            "Cart item {} has negative price {}",
            index + 1,
            line.unit_price
        )));
    }
    if line.unit_price > MAX_PRICE {
        return Err(OrderError::Validation(format!(
            "Cart item {} price exceeds maximum allowed ({}), got {}",
            index + 1,
            MAX_PRICE,
            line.unit_price
        )));
    }
    if line.quantity > MAX_QUANTITY {
        return Err(OrderError::Validation(format!(
            "Cart item {} quantity exceeds maximum allowed ({}), got {}",
            index + 1,
            MAX_QUANTITY,
            line.quantity
        )));
    }
    Ok(())
}

pub fn price_cart(cart: &[CartLine], method: ShippingMethod) -> OrderResult<PriceSummary> {
    if cart.is_empty() {
        return Err(OrderError::validation("Cart is empty"));
    }
    for (index, line) in cart.iter().enumerate() {
        validate_line(index, line)?;
    }

    let mut subtotal = Decimal::ZERO;
    for (index, line) in cart.iter().enumerate() {
        subtotal = line
            .line_total()
            .and_then(|total| subtotal.checked_add(total))
            .ok_or_else(|| {
                OrderError::Validation(format!("Cart item {} cannot be priced", index + 1))
            })?;
    }
    let subtotal = round_money(subtotal);
    let shipping = shipping_cost(method);
    let tax = subtotal
        .checked_mul(TAX_RATE)
        .map(round_money)
        .ok_or_else(|| OrderError::validation("Cart total is out of range"))?;
    let total = subtotal
        .checked_add(shipping)
        .and_then(|sum| sum.checked_add(tax))
        .ok_or_else(|| OrderError::validation("Cart total is out of range"))?;
    Ok(PriceSummary {
        subtotal,
        shipping,
        tax,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn single_phone_standard_shipping() {
        let cart = vec![CartLine::new(Some(1), "Phone", 200.00, 1)];
        let summary = price_cart(&cart, ShippingMethod::Standard).unwrap();
        assert_eq!(summary.subtotal, money("200.00"));
        assert_eq!(summary.shipping, money("5.99"));
        assert_eq!(summary.tax, money("16.00"));
        assert_eq!(summary.total, money("221.99"));
    }

    #[test]
    fn cables_express_shipping_rounds_tax() {
        let cart = vec![CartLine::new(Some(2), "Cable", 9.99, 3)];
        let summary = price_cart(&cart, ShippingMethod::Express).unwrap();
        assert_eq!(summary.subtotal, money("29.97"));
        assert_eq!(summary.shipping, money("9.99"));
        assert_eq!(summary.tax, money("2.40"));
        assert_eq!(summary.total, money("42.36"));
    }

    #[test]
    fn subtotal_sums_every_line() {
        let cart = vec![
            CartLine::new(Some(1), "Case", 12.50, 2),
            CartLine::new(None, "Sticker", 0.10, 7),
            CartLine::new(Some(3), "Charger", 19.99, 1),
        ];
        let summary = price_cart(&cart, ShippingMethod::Standard).unwrap();
        assert_eq!(summary.subtotal, money("45.69"));
        assert_eq!(summary.total, summary.subtotal + summary.shipping + summary.tax);
    }

    #[test]
    fn free_items_are_allowed() {
        let cart = vec![CartLine::new(None, "Sample", 0.0, 1)];
        let summary = price_cart(&cart, ShippingMethod::Standard).unwrap();
        assert_eq!(summary.subtotal, Decimal::ZERO);
        assert_eq!(summary.tax, Decimal::ZERO);
        assert_eq!(summary.total, money("5.99"));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = price_cart(&[], ShippingMethod::Standard).unwrap_err();
        assert!(matches!(err, OrderError::Validation(ref m) if m == "Cart is empty"));
    }

    #[test]
    fn bad_lines_are_rejected() {
        for line in [
            CartLine::new(Some(1), "Zero", 1.0, 0),
            CartLine::new(Some(1), "Negative qty", 1.0, -2),
            CartLine::new(Some(1), "Negative price", -0.01, 1),
            CartLine::new(Some(1), "NaN", f64::NAN, 1),
            CartLine::new(Some(1), "Yacht", 1e30, 1),
            CartLine::new(Some(1), "Bulk", 5e28, i32::MAX),
            CartLine::new(Some(1), "Pallet", 1.0, MAX_QUANTITY + 1),
        ] {
            let err = price_cart(&[line], ShippingMethod::Express).unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn largest_allowed_cart_is_priced() {
        let cart = vec![
            CartLine::new(Some(1), "Villa", MAX_PRICE, MAX_QUANTITY),
            CartLine::new(Some(2), "Villa", MAX_PRICE, MAX_QUANTITY),
        ];
        let summary = price_cart(&cart, ShippingMethod::Express).unwrap();
        assert_eq!(summary.subtotal, money("19998000000.00"));
        assert_eq!(summary.tax, money("1599840000.00"));
        assert_eq!(summary.total, money("21597840009.99"));
    }

    #[test]
    fn stored_amounts_round_trip_to_cents() {
        assert_eq!(from_stored(to_f64(money("42.36"))), money("42.36"));
        assert_eq!(to_f64(money("2.3976")), 2.40);
    }
}
