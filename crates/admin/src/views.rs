//! Display structs and formatting shared by the back office pages.
//!
//! Templates get preformatted strings; times are shown in shop time.

use askama::Template;
use axum::response::Html;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use brewline_core::order::{Order, OrderItem, TimelineStep};
use brewline_core::OrderStatus;

/// The shop runs on Western Indonesian Time (UTC+7, no DST).
const SHOP_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// `datetime-local` input format.
const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn shop_zone() -> FixedOffset {
    FixedOffset::east_opt(SHOP_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `16 Oct 2026, 09:05` in shop time.
#[must_use]
pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&shop_zone())
        .format("%-d %b %Y, %H:%M")
        .to_string()
}

/// `09:05` in shop time.
#[must_use]
pub fn format_clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&shop_zone()).format("%H:%M").to_string()
}

/// Value for a `datetime-local` input.
#[must_use]
pub fn to_local_input(at: DateTime<Utc>) -> String {
    at.with_timezone(&shop_zone())
        .format(LOCAL_INPUT_FORMAT)
        .to_string()
}

/// Parse a `datetime-local` value entered in shop time. Blank means unset.
///
/// # Errors
///
/// Returns the chrono parse error for malformed input.
pub fn parse_local_input(value: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(value, LOCAL_INPUT_FORMAT)?;
    Ok(shop_zone()
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc)))
}

/// Order row for lists (dashboard, customer detail).
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub order_number: String,
    pub customer_name: String,
    pub fulfillment: &'static str,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub total: String,
    pub placed_at: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            fulfillment: order.fulfillment_type.label(),
            status_label: order.status_label(),
            badge_class: order.status.badge_class(),
            total: order.total.format(),
            placed_at: format_datetime(order.created_at),
        }
    }
}

/// Line item as the order pages show it.
#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub name: String,
    pub options: String,
    pub note: Option<String>,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            options: item.options_summary(),
            note: item.note.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.format(),
            line_total: item.line_total.format(),
        }
    }
}

/// One step of the status timeline.
#[derive(Debug, Clone)]
pub struct TimelineItem {
    pub label: &'static str,
    pub at: Option<String>,
    pub reached: bool,
    pub current: bool,
    pub cancelled: bool,
}

impl From<TimelineStep> for TimelineItem {
    fn from(step: TimelineStep) -> Self {
        Self {
            label: step.label,
            at: step.at.map(format_datetime),
            reached: step.reached,
            current: step.current,
            cancelled: step.status == OrderStatus::Cancelled,
        }
    }
}

#[must_use]
pub fn timeline(order: &Order) -> Vec<TimelineItem> {
    order.timeline().into_iter().map(TimelineItem::from).collect()
}

/// A status button: the target status and its label for this order.
#[derive(Debug, Clone)]
pub struct StatusAction {
    pub status: &'static str,
    pub label: &'static str,
}

/// Forward moves the state machine allows from the order's status.
/// Cancelling has its own form because it needs a reason.
#[must_use]
pub fn forward_actions(order: &Order) -> Vec<StatusAction> {
    order
        .status
        .allowed_transitions()
        .iter()
        .filter(|next| **next != OrderStatus::Cancelled)
        .map(|next| StatusAction {
            status: next.as_str(),
            label: next.action_label(order.fulfillment_type),
        })
        .collect()
}

/// Card on the order board.
#[derive(Debug, Clone)]
pub struct OrderCard {
    pub id: String,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub placed_at: String,
    pub total: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub items: Vec<OrderItemView>,
    /// The usual next step, shown as the card's main button.
    pub next: Option<StatusAction>,
    pub can_cancel: bool,
}

impl OrderCard {
    #[must_use]
    pub fn new(order: &Order, items: &[OrderItem]) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            delivery_address: order.delivery_address.clone(),
            notes: order.notes.clone(),
            placed_at: format_clock(order.created_at),
            total: order.total.format(),
            status_label: order.status_label(),
            badge_class: order.status.badge_class(),
            items: items.iter().map(OrderItemView::from).collect(),
            next: order.status.next_step().map(|next| StatusAction {
                status: next.as_str(),
                label: next.action_label(order.fulfillment_type),
            }),
            can_cancel: order.status.is_cancellable(),
        }
    }
}

/// Render a page, logging template failures.
pub fn render(template: &impl Template) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brewline_core::{FulfillmentType, Money, OrderId};

    use super::*;

    fn order(status: OrderStatus, fulfillment: FulfillmentType) -> Order {
        let placed = Utc.with_ymd_and_hms(2026, 10, 16, 1, 30, 0).unwrap();
        Order {
            id: OrderId::generate(),
            order_number: "BRW-261016-0007".to_owned(),
            user_id: None,
            customer_name: "Dewi".to_owned(),
            customer_phone: Some("6281211112222".to_owned()),
            fulfillment_type: fulfillment,
            delivery_address: None,
            subtotal: Money::rupiah(50_000),
            delivery_fee: Money::ZERO,
            total: Money::rupiah(50_000),
            status,
            notes: None,
            cancel_reason: None,
            created_at: placed,
            updated_at: placed,
            processing_at: None,
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_forward_actions_leave_out_cancel() {
        let actions = forward_actions(&order(OrderStatus::New, FulfillmentType::Pickup));
        let statuses: Vec<_> = actions.iter().map(|a| a.status).collect();
        assert_eq!(statuses, ["processing"]);

        assert!(forward_actions(&order(OrderStatus::Completed, FulfillmentType::Pickup)).is_empty());
    }

    #[test]
    fn test_card_labels_follow_fulfillment() {
        let card = OrderCard::new(&order(OrderStatus::Processing, FulfillmentType::Delivery), &[]);
        let next = card.next.unwrap();
        assert_eq!(next.status, "ready");
        assert_eq!(next.label, "Send out");
        assert_eq!(card.placed_at, "08:30");
        assert!(card.can_cancel);

        let card = OrderCard::new(&order(OrderStatus::Ready, FulfillmentType::Pickup), &[]);
        assert_eq!(card.next.unwrap().label, "Mark picked up");
        assert!(!card.can_cancel);
    }

    #[test]
    fn test_local_input_round_trips_through_shop_time() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 2, 5, 0).unwrap();
        assert_eq!(to_local_input(at), "2026-10-16T09:05");
        assert_eq!(parse_local_input("2026-10-16T09:05").unwrap(), Some(at));
    }

    #[test]
    fn test_blank_local_input_is_unset() {
        assert_eq!(parse_local_input("  ").unwrap(), None);
        assert!(parse_local_input("16/10/2026").is_err());
    }

    #[test]
    fn test_times_render_in_shop_zone() {
        let late = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        assert_eq!(format_datetime(late), "17 Oct 2026, 03:00");
        assert_eq!(format_clock(late), "03:00");
    }
}
