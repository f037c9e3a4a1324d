//! Server-side pricing of cart lines and order totals.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::order::OrderLineOption;
use crate::types::{FulfillmentType, Money, ProductId};

/// A cart line with prices resolved against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub options: Vec<OrderLineOption>,
    pub note: Option<String>,
    pub line_total: Money,
}

/// Price one line: effective product price plus every option's extra.
#[must_use]
pub fn price_line(
    product: &Product,
    options: Vec<OrderLineOption>,
    quantity: u32,
    note: Option<String>,
) -> PricedLine {
    let unit_price =
        product.effective_price() + options.iter().map(|o| o.extra_price).sum::<Money>();
    PricedLine {
        product_id: product.id,
        product_name: product.name.clone(),
        unit_price,
        quantity,
        options,
        note,
        line_total: unit_price * quantity,
    }
}

/// Order money summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Sum the lines; the delivery fee only applies to delivery orders.
    #[must_use]
    pub fn compute(
        lines: &[PricedLine],
        fulfillment: FulfillmentType,
        delivery_fee: Money,
    ) -> Self {
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        let delivery_fee = match fulfillment {
            FulfillmentType::Pickup => Money::ZERO,
            FulfillmentType::Delivery => delivery_fee,
        };
        Self {
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;

    fn topping(name: &str, extra: u32) -> OrderLineOption {
        OrderLineOption {
            group: "Toppings".into(),
            name: name.into(),
            extra_price: Money::rupiah(extra),
        }
    }

    #[test]
    fn test_unit_price_adds_option_extras_to_effective_price() {
        let p = product(1, 25_000, Some(22_000));
        let line = price_line(&p, vec![topping("Boba", 5_000), topping("Oat milk", 8_000)], 2, None);
        assert_eq!(line.unit_price, Money::rupiah(35_000));
        assert_eq!(line.line_total, Money::rupiah(70_000));
        assert_eq!(line.product_name, "Product 1");
    }

    #[test]
    fn test_totals_charge_delivery_fee_only_for_delivery() {
        let lines = vec![
            price_line(&product(1, 25_000, None), vec![], 1, None),
            price_line(&product(2, 18_000, None), vec![], 2, None),
        ];
        let fee = Money::rupiah(10_000);

        let pickup = OrderTotals::compute(&lines, FulfillmentType::Pickup, fee);
        assert_eq!(pickup.subtotal, Money::rupiah(61_000));
        assert_eq!(pickup.delivery_fee, Money::ZERO);
        assert_eq!(pickup.total, Money::rupiah(61_000));

        let delivery = OrderTotals::compute(&lines, FulfillmentType::Delivery, fee);
        assert_eq!(delivery.total, Money::rupiah(71_000));
    }
}
