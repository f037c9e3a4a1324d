//! Orders, their line items and the rules around placing and cancelling them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::{OrderTotals, PricedLine};
use crate::types::{
    AddressId, FulfillmentType, Money, OrderId, OrderItemId, OrderStatus, PhoneNumber, ProductId,
    UserId,
};
use crate::validation::{ValidationError, char_len};

/// Snapshot of one chosen option, stored as JSON on the order item so later
/// catalog edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineOption {
    pub group: String,
    pub name: String,
    pub extra_price: Money,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelReasonError {
    #[error("please give a reason of at least {min} characters")]
    TooShort { min: usize },
    #[error("reason must be at most {max} characters")]
    TooLong { max: usize },
}

/// Why an order was cancelled, as shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CancelReason(String);

impl CancelReason {
    pub const MIN_CHARS: usize = 10;
    pub const MAX_CHARS: usize = 500;

    /// # Errors
    ///
    /// Returns [`CancelReasonError`] when the trimmed reason is shorter than
    /// ten or longer than five hundred characters.
    pub fn parse(input: &str) -> Result<Self, CancelReasonError> {
        let len = char_len(input);
        if len < Self::MIN_CHARS {
            return Err(CancelReasonError::TooShort {
                min: Self::MIN_CHARS,
            });
        }
        if len > Self::MAX_CHARS {
            return Err(CancelReasonError::TooLong {
                max: Self::MAX_CHARS,
            });
        }
        Ok(Self(input.trim().to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CancelReason {
    type Error = CancelReasonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CancelReason> for String {
    fn from(reason: CancelReason) -> Self {
        reason.0
    }
}

/// Human-facing order reference, `BRW-YYMMDD-NNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "BRW";

    /// Build from the order date and a value drawn from `order_number_seq`.
    #[must_use]
    pub fn new(date: NaiveDate, sequence: i64) -> Self {
        let serial = sequence.rem_euclid(10_000);
        Self(format!(
            "{}-{}-{serial:04}",
            Self::PREFIX,
            date.format("%y%m%d")
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub fulfillment_type: FulfillmentType,
    pub delivery_address: Option<String>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// One step of the tracking timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineStep {
    pub status: OrderStatus,
    pub label: &'static str,
    pub at: Option<DateTime<Utc>>,
    pub reached: bool,
    pub current: bool,
}

impl Order {
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        self.status.label(self.fulfillment_type)
    }

    /// When the order entered `status`, if it has.
    #[must_use]
    pub const fn entered_at(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::New => Some(self.created_at),
            OrderStatus::Processing => self.processing_at,
            OrderStatus::Ready => self.ready_at,
            OrderStatus::Completed => self.completed_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }

    /// The happy-path steps with reached/current flags. Cancelled orders
    /// show the steps they got through followed by the cancellation.
    #[must_use]
    pub fn timeline(&self) -> Vec<TimelineStep> {
        let fulfillment = self.fulfillment_type;
        let step = |status: OrderStatus| {
            let at = self.entered_at(status);
            TimelineStep {
                status,
                label: status.label(fulfillment),
                at,
                reached: at.is_some(),
                current: status == self.status,
            }
        };

        let happy = [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Ready,
            OrderStatus::Completed,
        ];
        if self.status == OrderStatus::Cancelled {
            let mut steps: Vec<TimelineStep> = happy
                .into_iter()
                .map(step)
                .filter(|s| s.reached)
                .collect();
            steps.push(step(OrderStatus::Cancelled));
            steps
        } else {
            happy.into_iter().map(step).collect()
        }
    }
}

/// A stored line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub options: Vec<OrderLineOption>,
    pub note: Option<String>,
    pub line_total: Money,
}

impl OrderItem {
    /// `Less sugar, Boba` style summary for compact lists.
    #[must_use]
    pub fn options_summary(&self) -> String {
        self.options
            .iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything needed to insert an order; built by checkout after pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub customer_name: String,
    pub customer_phone: Option<PhoneNumber>,
    pub fulfillment_type: FulfillmentType,
    pub address_id: Option<AddressId>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

impl NewOrder {
    pub const MAX_NOTES: usize = 300;

    /// # Errors
    ///
    /// Returns every failed field: empty cart, missing name, a delivery
    /// order without an address, or overlong notes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        errors.check(!self.lines.is_empty(), "cart", "Your cart is empty");
        errors.check(
            char_len(&self.customer_name) > 0,
            "customer_name",
            "Name is required",
        );
        if self.fulfillment_type == FulfillmentType::Delivery {
            errors.check(
                self.delivery_address
                    .as_deref()
                    .is_some_and(|a| char_len(a) > 0),
                "address_id",
                "Choose a delivery address",
            );
        }
        errors.check(
            self.notes
                .as_deref()
                .is_none_or(|n| char_len(n) <= Self::MAX_NOTES),
            "notes",
            format!("Notes must be at most {} characters", Self::MAX_NOTES),
        );
        errors.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_cancel_reason_needs_ten_characters_after_trimming() {
        assert_eq!(
            CancelReason::parse("   too short   "),
            Err(CancelReasonError::TooShort { min: 10 })
        );
        assert_eq!(
            CancelReason::parse("123456789"),
            Err(CancelReasonError::TooShort { min: 10 })
        );
        let ok = CancelReason::parse("  1234567890  ").unwrap();
        assert_eq!(ok.as_str(), "1234567890");
    }

    #[test]
    fn test_cancel_reason_rejects_overlong_text() {
        let long = "x".repeat(501);
        assert_eq!(
            CancelReason::parse(&long),
            Err(CancelReasonError::TooLong { max: 500 })
        );
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(OrderNumber::new(date, 42).as_str(), "BRW-250307-0042");
        assert_eq!(OrderNumber::new(date, 10_001).as_str(), "BRW-250307-0001");
    }

    fn order(status: OrderStatus, fulfillment: FulfillmentType) -> Order {
        let t = |h: u32| Utc.with_ymd_and_hms(2025, 3, 7, h, 0, 0).unwrap();
        Order {
            id: OrderId::generate(),
            order_number: "BRW-250307-0001".into(),
            user_id: Some(UserId::generate()),
            customer_name: "Ani".into(),
            customer_phone: Some("6281234567890".into()),
            fulfillment_type: fulfillment,
            delivery_address: None,
            subtotal: Money::rupiah(25_000),
            delivery_fee: Money::ZERO,
            total: Money::rupiah(25_000),
            status,
            notes: None,
            cancel_reason: None,
            created_at: t(8),
            updated_at: t(9),
            processing_at: Some(t(9)),
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_timeline_marks_reached_steps() {
        let o = order(OrderStatus::Processing, FulfillmentType::Delivery);
        let steps = o.timeline();
        let labels: Vec<&str> = steps.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            ["Order received", "Being prepared", "Out for delivery", "Delivered"]
        );
        let reached: Vec<bool> = steps.iter().map(|s| s.reached).collect();
        assert_eq!(reached, [true, true, false, false]);
        assert!(steps.iter().any(|s| s.current && s.status == OrderStatus::Processing));
    }

    #[test]
    fn test_cancelled_timeline_ends_with_cancellation() {
        let mut o = order(OrderStatus::Cancelled, FulfillmentType::Pickup);
        o.cancelled_at = Some(o.updated_at);
        let statuses: Vec<OrderStatus> = o.timeline().iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            [OrderStatus::New, OrderStatus::Processing, OrderStatus::Cancelled]
        );
    }

    #[test]
    fn test_options_summary() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::generate(),
            product_id: Some(ProductId::new(1)),
            product_name: "Es Kopi Susu".into(),
            unit_price: Money::rupiah(30_000),
            quantity: 1,
            options: vec![
                OrderLineOption {
                    group: "Sugar".into(),
                    name: "Less sugar".into(),
                    extra_price: Money::ZERO,
                },
                OrderLineOption {
                    group: "Toppings".into(),
                    name: "Boba".into(),
                    extra_price: Money::rupiah(5_000),
                },
            ],
            note: None,
            line_total: Money::rupiah(30_000),
        };
        assert_eq!(item.options_summary(), "Less sugar, Boba");
    }
}
