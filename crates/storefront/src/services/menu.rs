//! Cached menu snapshot.
//!
//! The whole menu (active categories, orderable products and their option
//! groups) is loaded as one `moka` entry with a 10 minute TTL. Any
//! `catalog_changes` notification drops it so the next page view reloads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument};

use brewline_core::ProductId;
use brewline_core::catalog::{Category, OptionGroupWithItems, Product};
use brewline_platform::db::RepositoryError;
use brewline_platform::realtime::ChangeFeed;

use crate::db::MenuRepository;

const MENU_TTL: Duration = Duration::from_secs(600);

/// Everything the menu pages render.
#[derive(Debug, Default)]
pub struct MenuSnapshot {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub option_groups: HashMap<ProductId, Vec<OptionGroupWithItems>>,
}

impl MenuSnapshot {
    #[must_use]
    pub fn featured(&self) -> Vec<&Product> {
        self.products.iter().filter(|p| p.is_featured).collect()
    }

    #[must_use]
    pub fn category_by_slug(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    /// Products in the category with `slug` (all when `None`) whose name
    /// or description contains `query`, case-insensitively.
    #[must_use]
    pub fn filter(&self, slug: Option<&str>, query: Option<&str>) -> Vec<&Product> {
        let category = slug.map(|s| self.category_by_slug(s).map(|c| c.id));
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        self.products
            .iter()
            .filter(|p| match category {
                None => true,
                Some(id) => id.is_some() && p.category_id == id,
            })
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                })
            })
            .collect()
    }

    /// Whether the product has options the customer must pick on its page.
    #[must_use]
    pub fn needs_options(&self, id: ProductId) -> bool {
        self.option_groups
            .get(&id)
            .is_some_and(|groups| groups.iter().any(|g| g.group.is_required))
    }
}

/// Single-entry cache around [`MenuSnapshot`].
#[derive(Clone)]
pub struct MenuCache {
    cache: Cache<(), Arc<MenuSnapshot>>,
}

impl Default for MenuCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(MENU_TTL)
                .build(),
        }
    }

    /// The cached menu, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading fails; nothing is cached then.
    #[instrument(skip_all)]
    pub async fn get(&self, pool: &PgPool) -> Result<Arc<MenuSnapshot>, RepositoryError> {
        if let Some(snapshot) = self.cache.get(&()).await {
            debug!("Cache hit for menu");
            return Ok(snapshot);
        }

        let repo = MenuRepository::new(pool);
        let categories = repo.active_categories().await?;
        let products = repo.orderable_products().await?;
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let option_groups = repo.option_groups_for_products(&ids).await?;

        let snapshot = Arc::new(MenuSnapshot {
            categories,
            products,
            option_groups,
        });
        self.cache.insert((), Arc::clone(&snapshot)).await;
        debug!(products = snapshot.products.len(), "Menu loaded");
        Ok(snapshot)
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Drop the cached menu whenever the catalog changes. A lagged
    /// receiver may have missed a change, so it invalidates too.
    pub fn spawn_invalidator(&self, feed: &ChangeFeed) {
        let cache = self.clone();
        let mut events = feed.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.is_catalog() => {
                        debug!(table = %event.table, "Catalog changed, dropping menu cache");
                        cache.invalidate().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged, dropping menu cache");
                        cache.invalidate().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Change feed closed, menu invalidator stopping");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use brewline_core::{CategoryId, Money};
    use brewline_platform::realtime::{ChangeEvent, ChangeOp};

    fn category(id: i32, slug: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: slug.to_uppercase(),
            slug: slug.to_owned(),
            sort_order: id,
            is_active: true,
        }
    }

    fn product(id: i32, category: i32, name: &str, featured: bool) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: Some(CategoryId::new(category)),
            name: name.to_owned(),
            description: String::new(),
            price: Money::rupiah(20_000),
            discount_price: None,
            image_url: None,
            stock: 10,
            is_available: true,
            is_featured: featured,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot() -> MenuSnapshot {
        MenuSnapshot {
            categories: vec![category(1, "coffee"), category(2, "pastry")],
            products: vec![
                product(1, 1, "Kopi Susu Gula Aren", true),
                product(2, 1, "Americano", false),
                product(3, 2, "Butter Croissant", false),
            ],
            option_groups: HashMap::new(),
        }
    }

    #[test]
    fn test_filter_by_category_and_query() {
        let menu = snapshot();
        assert_eq!(menu.filter(None, None).len(), 3);
        assert_eq!(menu.filter(Some("coffee"), None).len(), 2);
        assert_eq!(menu.filter(Some("coffee"), Some("aren"))[0].name, "Kopi Susu Gula Aren");
        assert!(menu.filter(Some("tea"), None).is_empty());
        assert_eq!(menu.filter(None, Some("  CROISS ")).len(), 1);
        assert_eq!(menu.featured().len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_event_drops_cached_menu() {
        let cache = MenuCache::new();
        cache.cache.insert((), Arc::new(snapshot())).await;

        let feed = ChangeFeed::detached();
        cache.spawn_invalidator(&feed);
        tokio::task::yield_now().await;

        feed.publish(ChangeEvent {
            table: "orders".into(),
            op: ChangeOp::Update,
            id: None,
            status: None,
            fulfillment_type: None,
            user_id: None,
        });
        feed.publish(ChangeEvent {
            table: "products".into(),
            op: ChangeOp::Update,
            id: Some("2".into()),
            status: None,
            fulfillment_type: None,
            user_id: None,
        });

        for _ in 0..50 {
            if cache.cache.get(&()).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("menu cache was not invalidated");
    }

    #[tokio::test]
    async fn test_lagged_invalidator_drops_cached_menu() {
        let cache = MenuCache::new();
        cache.cache.insert((), Arc::new(snapshot())).await;

        let feed = ChangeFeed::detached();
        cache.spawn_invalidator(&feed);

        // Order events alone never touch the menu; overflowing the channel
        // before the task runs leaves it lagged.
        for _ in 0..1_000 {
            feed.publish(ChangeEvent {
                table: "orders".into(),
                op: ChangeOp::Update,
                id: None,
                status: None,
                fulfillment_type: None,
                user_id: None,
            });
        }

        for _ in 0..50 {
            if cache.cache.get(&()).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("menu cache survived a lagged change feed");
    }
}
