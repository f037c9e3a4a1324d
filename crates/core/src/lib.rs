//! Brewline Core - domain types and rules for the coffee ordering platform.
//!
//! Shared by every component:
//! - `platform` - database repositories and external service clients
//! - `storefront` - customer menu, cart, checkout and order tracking
//! - `admin` - back office for orders, catalog, promos and customers
//! - `cli` - migrations, menu seeding and staff roles
//!
//! # Architecture
//!
//! Types and pure functions only: no I/O, no database access, no HTTP
//! clients. The `postgres` feature adds sqlx encode/decode and `FromRow`
//! derives so the same types come straight out of queries.
//!
//! # Modules
//!
//! - [`types`] - IDs, email, phone, money, order status and roles
//! - [`catalog`] - categories, products, option groups and selection rules
//! - [`cart`] / [`pricing`] - session cart and server-side pricing
//! - [`order`] - orders, line items, cancellation reasons, order numbers
//! - [`promo`], [`profile`], [`settings`] - banners, accounts, store settings
//! - [`messages`] - flash messages and friendly error text

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod messages;
pub mod order;
pub mod pricing;
pub mod profile;
pub mod promo;
pub mod settings;
pub mod types;
pub mod validation;

pub use types::*;
