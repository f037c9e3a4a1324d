//! Read-only catalog queries for the menu pages and cart pricing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brewline_core::catalog::{Category, OptionGroup, OptionGroupWithItems, OptionItem, Product};
use brewline_core::promo::Promo;
use brewline_core::{OptionGroupId, ProductId};
use brewline_platform::db::RepositoryError;

const PRODUCT_COLUMNS: &str = "id, category_id, name, description, price, discount_price, \
    image_url, stock, is_available, is_featured, created_at, updated_at";

const PROMO_COLUMNS: &str = "id, title, subtitle, image_url, product_id, is_active, sort_order, \
    starts_at, ends_at, created_at";

#[derive(sqlx::FromRow)]
struct LinkedGroup {
    product_id: ProductId,
    #[sqlx(flatten)]
    group: OptionGroup,
}

pub struct MenuRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MenuRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT id, name, slug, sort_order, is_active
            FROM categories
            WHERE is_active
            ORDER BY sort_order, name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Products a customer can order right now, in menu order. Products in
    /// a hidden category are left out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orderable_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products p
            WHERE p.is_available AND p.stock > 0
              AND (p.category_id IS NULL OR EXISTS (
                    SELECT 1 FROM categories c WHERE c.id = p.category_id AND c.is_active))
            ORDER BY p.is_featured DESC, p.name
            "
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(products)
    }

    /// Any product, including sold-out ones, so the detail page can say so.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn option_groups_for_product(
        &self,
        id: ProductId,
    ) -> Result<Vec<OptionGroupWithItems>, RepositoryError> {
        let mut by_product = self.option_groups_for_products(&[id]).await?;
        Ok(by_product.remove(&id).unwrap_or_default())
    }

    /// Option groups (with items) for several products at once, keyed by
    /// product. Products without groups are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn option_groups_for_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Vec<OptionGroupWithItems>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let links = sqlx::query_as::<_, LinkedGroup>(
            r"
            SELECT pog.product_id, g.id, g.name, g.is_required, g.max_select, g.sort_order
            FROM product_option_groups pog
            JOIN option_groups g ON g.id = pog.group_id
            WHERE pog.product_id = ANY($1)
            ORDER BY g.sort_order, g.id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let group_ids: Vec<OptionGroupId> = links.iter().map(|l| l.group.id).collect();
        let items = sqlx::query_as::<_, OptionItem>(
            r"
            SELECT id, group_id, name, extra_price, is_available, sort_order
            FROM option_items
            WHERE group_id = ANY($1)
            ORDER BY sort_order, id
            ",
        )
        .bind(&group_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, Vec<OptionGroupWithItems>> = HashMap::new();
        for link in links {
            let group_items = items
                .iter()
                .filter(|item| item.group_id == link.group.id)
                .cloned()
                .collect();
            by_product
                .entry(link.product_id)
                .or_default()
                .push(OptionGroupWithItems {
                    group: link.group,
                    items: group_items,
                });
        }
        Ok(by_product)
    }

    /// Active promos inside their schedule window at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn live_promos(&self, now: DateTime<Utc>) -> Result<Vec<Promo>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PROMO_COLUMNS} FROM promos
            WHERE is_active
              AND (starts_at IS NULL OR starts_at <= $1)
              AND (ends_at IS NULL OR ends_at > $1)
            ORDER BY sort_order, id
            "
        );
        let promos = sqlx::query_as::<_, Promo>(&sql)
            .bind(now)
            .fetch_all(self.pool)
            .await?;
        Ok(promos)
    }
}
