//! Session-bound models for admin.
//!
//! Catalog, order and profile types come from `brewline-core`.

pub mod session;

pub use session::{CurrentStaff, keys as session_keys};
