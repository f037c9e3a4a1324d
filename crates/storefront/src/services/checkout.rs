//! Turning the session cart into an order.

use serde::Deserialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument};

use brewline_core::order::{NewOrder, Order};
use brewline_core::pricing::OrderTotals;
use brewline_core::validation::ValidationError;
use brewline_core::{AddressId, FulfillmentType, PhoneNumber};
use brewline_platform::db::{
    OrderRepository, ProfileRepository, RepositoryError, SettingsRepository,
};
use brewline_platform::whatsapp::OrderEvent;

use super::cart::{load_cart, price_cart, save_cart};
use crate::db::AddressRepository;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Submitted checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    pub fulfillment_type: String,
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("The store is closed right now")]
    StoreClosed,

    #[error("Delivery is not available right now")]
    DeliveryUnavailable,

    #[error("Your cart is empty")]
    EmptyCart,

    /// Some lines were dropped while pricing; the customer should review.
    #[error("Some items are no longer available: {}", .0.join(", "))]
    CartChanged(Vec<String>),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
}

impl CheckoutError {
    /// Whether the customer can fix this by changing the form or cart.
    #[must_use]
    pub const fn is_customer_error(&self) -> bool {
        !matches!(
            self,
            Self::Session(_)
                | Self::Repository(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
        )
    }
}

/// Validate, price and place the order, then clear the cart and queue
/// notifications.
///
/// # Errors
///
/// Returns a [`CheckoutError`] describing the first problem found. Nothing
/// is written and the cart is kept in every error case.
#[instrument(skip(state, session, form), fields(user_id = %customer.id))]
pub async fn place_order(
    state: &AppState,
    session: &Session,
    customer: &CurrentCustomer,
    form: &CheckoutForm,
) -> Result<Order, CheckoutError> {
    let pool = state.pool();
    let settings = SettingsRepository::new(pool).store().await?;
    if !settings.is_open {
        return Err(CheckoutError::StoreClosed);
    }

    let fulfillment: FulfillmentType = form
        .fulfillment_type
        .parse()
        .map_err(|_| ValidationError::field("fulfillment_type", "Choose pickup or delivery"))?;
    if fulfillment == FulfillmentType::Delivery && !settings.delivery_enabled {
        return Err(CheckoutError::DeliveryUnavailable);
    }

    let mut cart = load_cart(session).await;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let priced = price_cart(pool, &mut cart).await?;
    if !priced.removed.is_empty() {
        save_cart(session, &cart).await?;
        return Err(CheckoutError::CartChanged(priced.removed));
    }

    let address = match fulfillment {
        FulfillmentType::Pickup => None,
        FulfillmentType::Delivery => {
            let id = form
                .address_id
                .as_deref()
                .and_then(|raw| raw.parse::<AddressId>().ok())
                .ok_or_else(|| ValidationError::field("address_id", "Choose a delivery address"))?;
            let address = AddressRepository::new(pool)
                .get(customer.id, id)
                .await?
                .ok_or_else(|| ValidationError::field("address_id", "Choose a delivery address"))?;
            Some(address)
        }
    };

    let phone = if form.customer_phone.trim().is_empty() {
        None
    } else {
        Some(
            PhoneNumber::parse(&form.customer_phone)
                .map_err(|e| ValidationError::field("customer_phone", e.to_string()))?,
        )
    };

    let lines = priced.lines();
    let totals = OrderTotals::compute(&lines, fulfillment, settings.delivery_fee);
    let notes = Some(form.notes.trim().to_owned()).filter(|n| !n.is_empty());
    let new_order = NewOrder {
        user_id: customer.id,
        customer_name: form.customer_name.trim().to_owned(),
        customer_phone: phone,
        fulfillment_type: fulfillment,
        address_id: address.as_ref().map(|a| a.id),
        delivery_address: address.as_ref().map(brewline_core::profile::Address::one_line),
        notes,
        lines,
        totals,
    };
    new_order.validate()?;

    let orders = OrderRepository::new(pool);
    let order = orders.create(&new_order).await?;
    info!(order_id = %order.id, order_number = %order.order_number, total = %order.total, "Order placed");

    cart.clear();
    save_cart(session, &cart).await?;

    match orders.items(order.id).await {
        Ok(items) => state
            .notifier()
            .notify(OrderEvent::Placed, order.clone(), items),
        Err(e) => tracing::warn!(error = %e, "Could not load items for notification"),
    }

    Ok(order)
}

/// Name and phone to prefill the checkout form with.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the profile query fails.
pub async fn contact_defaults(
    state: &AppState,
    customer: &CurrentCustomer,
) -> Result<(String, String), RepositoryError> {
    let profile = ProfileRepository::new(state.pool()).get(customer.id).await?;
    Ok(profile.map_or_else(
        || (customer.name.clone(), String::new()),
        |p| (p.display_name().to_owned(), p.phone.unwrap_or_default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewline_core::{OrderStatus, TransitionError};

    #[test]
    fn test_customer_errors_are_told_apart_from_outages() {
        assert!(CheckoutError::StoreClosed.is_customer_error());
        assert!(
            CheckoutError::Repository(RepositoryError::OutOfStock("Latte".into()))
                .is_customer_error()
        );
        assert!(
            CheckoutError::Repository(RepositoryError::Transition(TransitionError {
                from: OrderStatus::New,
                to: OrderStatus::New,
            }))
            .is_customer_error()
        );
        assert!(
            !CheckoutError::Repository(RepositoryError::DataCorruption("bad row".into()))
                .is_customer_error()
        );
    }

    #[test]
    fn test_cart_changed_lists_products() {
        let err = CheckoutError::CartChanged(vec!["Latte".into(), "Croissant".into()]);
        assert_eq!(
            err.to_string(),
            "Some items are no longer available: Latte, Croissant"
        );
    }
}
