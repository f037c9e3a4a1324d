//! Order status state machine, fulfillment types and account roles.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fulfillment_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Collected at the counter.
    Pickup,
    /// Sent to one of the customer's addresses.
    Delivery,
}

impl FulfillmentType {
    pub const ALL: [Self; 2] = [Self::Pickup, Self::Delivery];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pickup => "Pickup",
            Self::Delivery => "Delivery",
        }
    }
}

impl fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(Self::Pickup),
            "delivery" => Ok(Self::Delivery),
            _ => Err(format!("invalid fulfillment type: {s}")),
        }
    }
}

/// Rejected status change.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move an order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Where an order is in its lifecycle.
///
/// ```text
/// new ──> processing ──> ready ──> completed
///  │          │
///  └──────────┴──> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Processing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 5] = [
        Self::New,
        Self::Processing,
        Self::Ready,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Statuses an order still needs work in; these make up the order boards.
    pub const ACTIVE: [Self; 3] = [Self::New, Self::Processing, Self::Ready];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Every status reachable from `self` in one step.
    #[must_use]
    pub const fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            Self::New => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Ready, Self::Cancelled],
            Self::Ready => &[Self::Completed],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Validate a move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the state machine has no such edge.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// The forward step staff take next, if any.
    #[must_use]
    pub const fn next_step(&self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Processing),
            Self::Processing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::New | Self::Processing)
    }

    /// Customer-facing label. `ready` reads differently for delivery.
    #[must_use]
    pub const fn label(&self, fulfillment: FulfillmentType) -> &'static str {
        match (self, fulfillment) {
            (Self::New, _) => "Order received",
            (Self::Processing, _) => "Being prepared",
            (Self::Ready, FulfillmentType::Pickup) => "Ready for pickup",
            (Self::Ready, FulfillmentType::Delivery) => "Out for delivery",
            (Self::Completed, FulfillmentType::Pickup) => "Picked up",
            (Self::Completed, FulfillmentType::Delivery) => "Delivered",
            (Self::Cancelled, _) => "Cancelled",
        }
    }

    /// Button text for moving an order *into* this status.
    #[must_use]
    pub const fn action_label(&self, fulfillment: FulfillmentType) -> &'static str {
        match (self, fulfillment) {
            (Self::New, _) => "Reopen",
            (Self::Processing, _) => "Start preparing",
            (Self::Ready, FulfillmentType::Pickup) => "Mark ready",
            (Self::Ready, FulfillmentType::Delivery) => "Send out",
            (Self::Completed, FulfillmentType::Pickup) => "Mark picked up",
            (Self::Completed, FulfillmentType::Delivery) => "Mark delivered",
            (Self::Cancelled, _) => "Cancel order",
        }
    }

    /// CSS modifier used by badges in both UIs.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::New => "badge-new",
            Self::Processing => "badge-processing",
            Self::Ready => "badge-ready",
            Self::Completed => "badge-completed",
            Self::Cancelled => "badge-cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Account role stored on the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "profile_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    /// Storefront customer.
    #[default]
    Customer,
    /// Counter staff: orders, customers and the dashboard.
    Staff,
    /// Everything staff can do plus catalog, promos and settings.
    Admin,
}

impl ProfileRole {
    #[must_use]
    pub const fn can_access_back_office(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    #[must_use]
    pub const fn can_manage_catalog(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for ProfileRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid profile role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_walks_to_completed() {
        let mut status = OrderStatus::New;
        let mut seen = vec![status];
        while let Some(next) = status.next_step() {
            status = status.transition_to(next).unwrap();
            seen.push(status);
        }
        assert_eq!(
            seen,
            [
                OrderStatus::New,
                OrderStatus::Processing,
                OrderStatus::Ready,
                OrderStatus::Completed
            ]
        );
        assert!(status.is_terminal());
    }

    #[test]
    fn test_cancellation_only_before_ready() {
        assert!(OrderStatus::New.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        for status in OrderStatus::ALL {
            assert_eq!(
                status.is_cancellable(),
                status.can_transition_to(OrderStatus::Cancelled),
                "{status}"
            );
        }
    }

    #[test]
    fn test_rejects_skipped_and_backward_moves() {
        let err = OrderStatus::New
            .transition_to(OrderStatus::Ready)
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::New);
        assert_eq!(err.to, OrderStatus::Ready);
        assert_eq!(err.to_string(), "cannot move an order from new to ready");

        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Processing));
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.allowed_transitions().is_empty());
            assert_eq!(status.next_step(), None);
        }
    }

    #[test]
    fn test_every_status_has_labels_for_both_fulfillment_types() {
        for status in OrderStatus::ALL {
            for fulfillment in FulfillmentType::ALL {
                assert!(!status.label(fulfillment).is_empty());
                assert!(!status.action_label(fulfillment).is_empty());
            }
        }
        assert_eq!(
            OrderStatus::Ready.label(FulfillmentType::Pickup),
            "Ready for pickup"
        );
        assert_eq!(
            OrderStatus::Ready.label(FulfillmentType::Delivery),
            "Out for delivery"
        );
    }

    #[test]
    fn test_string_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_role_permissions() {
        assert!(!ProfileRole::Customer.can_access_back_office());
        assert!(ProfileRole::Staff.can_access_back_office());
        assert!(!ProfileRole::Staff.can_manage_catalog());
        assert!(ProfileRole::Admin.can_manage_catalog());
        assert_eq!("staff".parse::<ProfileRole>().unwrap(), ProfileRole::Staff);
    }
}
