//! Session-bound models for the storefront.
//!
//! Domain types (products, orders, addresses) come from `brewline-core`.

pub mod session;

pub use session::{CurrentCustomer, OAuthPending, PlatformTokens, keys as session_keys};
