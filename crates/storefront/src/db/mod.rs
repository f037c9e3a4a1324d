//! Storefront-only queries.
//!
//! Orders, profiles and settings repositories are shared with the back
//! office and live in `brewline_platform::db`; this module holds the
//! read-only menu queries and the customer address book.

pub mod addresses;
pub mod menu;

pub use addresses::AddressRepository;
pub use brewline_platform::db::{
    OrderRepository, ProfileRepository, RepositoryError, SettingsRepository, create_pool,
};
pub use menu::MenuRepository;
