//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `menu` - cached menu snapshot, invalidated by catalog changes
//! - `cart` - session cart storage and live pricing
//! - `checkout` - turning a priced cart into an order

pub mod cart;
pub mod checkout;
pub mod menu;
