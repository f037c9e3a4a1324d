//! Message texts sent to customers and to the shop.

use std::fmt::Write;

use brewline_core::order::{Order, OrderItem};
use brewline_core::{FulfillmentType, OrderStatus};

/// Sent to the customer right after checkout.
#[must_use]
pub fn order_received(order: &Order, store_name: &str) -> String {
    let how = match order.fulfillment_type {
        FulfillmentType::Pickup => "We'll let you know when it's ready for pickup.",
        FulfillmentType::Delivery => "We'll let you know when it's on the way.",
    };
    format!(
        "Hi {name}, thanks for ordering at {store_name}!\n\n\
         Order {number}\nTotal: {total}\n\n{how}",
        name = order.customer_name,
        number = order.order_number,
        total = order.total.format(),
    )
}

/// Sent to the customer when the order moves to `order.status`. `None` for
/// statuses that do not warrant a message.
#[must_use]
pub fn status_update(order: &Order, store_name: &str) -> Option<String> {
    let body = match (order.status, order.fulfillment_type) {
        (OrderStatus::Processing, _) => "Our baristas are preparing your order now.".to_owned(),
        (OrderStatus::Ready, FulfillmentType::Pickup) => {
            "Your order is ready! Show this order number at the counter.".to_owned()
        }
        (OrderStatus::Ready, FulfillmentType::Delivery) => {
            "Your order is on its way to you.".to_owned()
        }
        (OrderStatus::Completed, _) => format!("Enjoy your coffee, and see you again at {store_name}!"),
        (OrderStatus::Cancelled, _) => return Some(cancelled(order, store_name)),
        (OrderStatus::New, _) => return None,
    };
    Some(format!(
        "{store_name}: order {number}\nStatus: {label}\n\n{body}",
        number = order.order_number,
        label = order.status_label(),
    ))
}

#[must_use]
pub fn cancelled(order: &Order, store_name: &str) -> String {
    let mut text = format!(
        "{store_name}: order {number} has been cancelled.",
        number = order.order_number
    );
    if let Some(reason) = order.cancel_reason.as_deref() {
        let _ = write!(text, "\nReason: {reason}");
    }
    text.push_str("\n\nAny items in stock have been released. Sorry for the trouble.");
    text
}

/// Alert for the shop's own number whenever an order comes in.
#[must_use]
pub fn new_order_alert(order: &Order, items: &[OrderItem]) -> String {
    let mut text = format!(
        "New {kind} order {number}\n{name}",
        kind = order.fulfillment_type.label().to_lowercase(),
        number = order.order_number,
        name = order.customer_name,
    );
    if let Some(phone) = order.customer_phone.as_deref() {
        let _ = write!(text, " ({phone})");
    }
    text.push('\n');
    for item in items {
        let _ = write!(text, "\n{}x {}", item.quantity, item.product_name);
        let options = item.options_summary();
        if !options.is_empty() {
            let _ = write!(text, " [{options}]");
        }
        if let Some(note) = item.note.as_deref() {
            let _ = write!(text, " - {note}");
        }
    }
    if let Some(address) = order.delivery_address.as_deref() {
        let _ = write!(text, "\n\nDeliver to: {address}");
    }
    if let Some(notes) = order.notes.as_deref() {
        let _ = write!(text, "\nNotes: {notes}");
    }
    let _ = write!(text, "\n\nTotal: {}", order.total.format());
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Utc;

    use brewline_core::order::OrderLineOption;
    use brewline_core::{Money, OrderId, OrderItemId, ProductId};

    use super::*;

    pub(crate) fn order(status: OrderStatus, fulfillment: FulfillmentType) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            order_number: "BRW-250101-0007".to_owned(),
            user_id: None,
            customer_name: "Sari".to_owned(),
            customer_phone: Some("6281234567890".to_owned()),
            fulfillment_type: fulfillment,
            delivery_address: (fulfillment == FulfillmentType::Delivery)
                .then(|| "Jl. Melati 5, Bandung".to_owned()),
            subtotal: Money::rupiah(50_000),
            delivery_fee: Money::ZERO,
            total: Money::rupiah(50_000),
            status,
            notes: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            processing_at: None,
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_received_mentions_number_and_total() {
        let text = order_received(&order(OrderStatus::New, FulfillmentType::Pickup), "Brewline");
        assert!(text.contains("BRW-250101-0007"));
        assert!(text.contains("Rp 50.000"));
        assert!(text.contains("pickup"));
    }

    #[test]
    fn test_ready_text_depends_on_fulfillment() {
        let pickup = status_update(&order(OrderStatus::Ready, FulfillmentType::Pickup), "B").unwrap();
        let delivery =
            status_update(&order(OrderStatus::Ready, FulfillmentType::Delivery), "B").unwrap();
        assert!(pickup.contains("Ready for pickup"));
        assert!(delivery.contains("Out for delivery"));
        assert!(delivery.contains("on its way"));
    }

    #[test]
    fn test_new_status_has_no_update() {
        assert!(status_update(&order(OrderStatus::New, FulfillmentType::Pickup), "B").is_none());
    }

    #[test]
    fn test_cancelled_includes_reason() {
        let mut o = order(OrderStatus::Cancelled, FulfillmentType::Pickup);
        o.cancel_reason = Some("Milk ran out for today".to_owned());
        let text = status_update(&o, "B").unwrap();
        assert!(text.contains("cancelled"));
        assert!(text.contains("Reason: Milk ran out for today"));
    }

    #[test]
    fn test_alert_lists_items_and_options() {
        let o = order(OrderStatus::New, FulfillmentType::Delivery);
        let items = vec![OrderItem {
            id: OrderItemId::new(1),
            order_id: o.id,
            product_id: Some(ProductId::new(3)),
            product_name: "Kopi Susu".to_owned(),
            unit_price: Money::rupiah(25_000),
            quantity: 2,
            options: vec![OrderLineOption {
                group: "Sugar".to_owned(),
                name: "Less sugar".to_owned(),
                extra_price: Money::ZERO,
            }],
            note: Some("extra hot".to_owned()),
            line_total: Money::rupiah(50_000),
        }];
        let text = new_order_alert(&o, &items);
        assert!(text.starts_with("New delivery order BRW-250101-0007"));
        assert!(text.contains("2x Kopi Susu [Less sugar] - extra hot"));
        assert!(text.contains("Deliver to: Jl. Melati 5, Bandung"));
    }
}
