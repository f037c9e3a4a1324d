//! Display structs shared by several pages.
//!
//! Templates only see preformatted strings: money as `Rp 25.000`, times in
//! the shop's local zone.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use brewline_core::catalog::Product;
use brewline_core::order::{Order, TimelineStep};
use brewline_core::{OrderStatus, ProductId};

/// The shop runs on Western Indonesian Time (UTC+7, no DST).
const SHOP_UTC_OFFSET_SECS: i32 = 7 * 3600;

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

/// Menu tile used on the home page and the menu grid.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: String,
    /// List price, shown struck through when discounted.
    pub original_price: Option<String>,
    pub discount_percent: u32,
    /// Options must be picked on the detail page before adding.
    pub needs_options: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, needs_options: bool) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
            price: product.effective_price().format(),
            original_price: product.has_discount().then(|| product.price.format()),
            discount_percent: product.discount_percent(),
            needs_options,
        }
    }
}

/// Row in the order history list.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: String,
    pub order_number: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub fulfillment: &'static str,
    pub total: String,
    pub placed_at: String,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.clone(),
            status_label: order.status_label(),
            badge_class: order.status.badge_class(),
            fulfillment: order.fulfillment_type.label(),
            total: order.total.format(),
            placed_at: format_datetime(order.created_at),
        }
    }
}

/// One step of the tracking timeline.
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
            at: step.at.map(format_clock),
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_times_render_in_shop_zone() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 2, 5, 0).unwrap();
        assert_eq!(format_clock(at), "09:05");
        assert_eq!(format_datetime(at), "16 Oct 2026, 09:05");

        // 20:00 UTC is already the next day in Jakarta
        let late = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        assert_eq!(format_datetime(late), "17 Oct 2026, 03:00");
    }
}
