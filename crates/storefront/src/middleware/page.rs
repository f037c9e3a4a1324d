//! Per-request data every full page layout needs.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use brewline_core::cart::Cart;
use brewline_core::messages::Flash;

use super::flash::take_flash;
use super::security_headers::CspNonce;
use crate::models::{CurrentCustomer, session_keys};

/// Header state for `base.html`: who is signed in, the cart badge, pending
/// toasts and the CSP nonce.
///
/// Extracting it consumes the flash queue, so only handlers that render a
/// full page should take it.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub customer: Option<CurrentCustomer>,
    pub cart_count: u32,
    pub flashes: Vec<Flash>,
    pub nonce: String,
}

impl PageContext {
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.customer.is_some()
    }

    #[must_use]
    pub fn customer_name(&self) -> &str {
        self.customer.as_ref().map_or("", |c| c.name.as_str())
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                nonce,
                ..Self::default()
            });
        };

        let customer = session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten();
        let cart_count = session
            .get::<Cart>(session_keys::CART)
            .await
            .ok()
            .flatten()
            .map_or(0, |cart| cart.item_count());
        let flashes = take_flash(&session).await;

        Ok(Self {
            customer,
            cart_count,
            flashes,
            nonce,
        })
    }
}
