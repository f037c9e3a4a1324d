//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use brewline_core::UserId;

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Platform auth user id (also the profile id).
    pub id: UserId,
    pub email: Option<String>,
    /// Display name for the header.
    pub name: String,
}

/// Platform tokens for the signed-in customer.
///
/// Kept apart from [`CurrentCustomer`] so templates never see them.
#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for PlatformTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// PKCE state for an OAuth round trip.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthPending {
    pub state: String,
    pub verifier: String,
    /// Where to send the customer after login.
    pub return_to: Option<String>,
}

impl std::fmt::Debug for OAuthPending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthPending")
            .field("state", &self.state)
            .field("verifier", &"[REDACTED]")
            .field("return_to", &self.return_to)
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the platform access and refresh tokens.
    pub const PLATFORM_TOKENS: &str = "platform_tokens";

    /// Key for the in-flight OAuth PKCE state.
    pub const OAUTH_PENDING: &str = "oauth_pending";

    /// Key for the cart.
    pub const CART: &str = "cart";

    /// Key for the queued flash messages.
    pub const FLASH: &str = "flash";
}
