//! Back office queries.
//!
//! Orders, profiles and settings repositories are shared with the
//! storefront and live in `brewline_platform::db`; this module holds the
//! catalog writes, promo banners, the customer directory and the
//! dashboard aggregates.

pub mod board;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod options;
pub mod products;
pub mod promos;

pub use brewline_platform::db::orders::CancelActor;
pub use brewline_platform::db::{
    OrderRepository, ProfileRepository, RepositoryError, SettingsRepository, create_pool,
};
pub use board::BoardRepository;
pub use categories::CategoryRepository;
pub use customers::CustomerRepository;
pub use dashboard::DashboardRepository;
pub use options::OptionRepository;
pub use products::ProductRepository;
pub use promos::PromoRepository;

/// What to do with a stored image on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Replace(String),
    Remove,
}

impl ImageChange {
    /// The image URL to store, given the current one.
    #[must_use]
    pub fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            Self::Keep => current,
            Self::Replace(url) => Some(url.clone()),
            Self::Remove => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_change_apply() {
        let current = Some("https://cdn.test/a.png".to_owned());
        assert_eq!(ImageChange::Keep.apply(current.clone()), current);
        assert_eq!(ImageChange::Remove.apply(current.clone()), None);
        assert_eq!(
            ImageChange::Replace("https://cdn.test/b.png".to_owned()).apply(current),
            Some("https://cdn.test/b.png".to_owned())
        );
    }
}
