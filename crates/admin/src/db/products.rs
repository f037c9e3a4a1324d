//! Product writes, option group assignment and stock adjustments.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};

use brewline_core::catalog::{Product, ProductDraft};
use brewline_core::{OptionGroupId, ProductId};

use super::{ImageChange, RepositoryError};

const PRODUCT_COLUMNS: &str = "id, category_id, name, description, price, discount_price, \
    image_url, stock, is_available, is_featured, created_at, updated_at";

/// Product row for the back office list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductListing {
    #[sqlx(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products, optionally narrowed by a name search, grouped by
    /// category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<ProductListing>, RepositoryError> {
        let pattern = search
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.replace('%', "\\%").replace('_', "\\_")));
        let rows = sqlx::query_as::<_, ProductListing>(
            r"
            SELECT p.id, p.category_id, p.name, p.description, p.price, p.discount_price,
                   p.image_url, p.stock, p.is_available, p.is_featured, p.created_at,
                   p.updated_at, c.name AS category_name
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE $1::text IS NULL OR p.name ILIKE $1
            ORDER BY c.sort_order NULLS LAST, p.name
            ",
        )
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists.
    pub async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Option groups currently assigned to the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn option_group_ids(
        &self,
        id: ProductId,
    ) -> Result<Vec<OptionGroupId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, OptionGroupId>(
            "SELECT group_id FROM product_option_groups WHERE product_id = $1 ORDER BY group_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Insert a product and its option group links in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails, for example
    /// when a linked category or group was deleted meanwhile.
    #[instrument(skip(self, draft, image_url), fields(name = %draft.name))]
    pub async fn create(
        &self,
        draft: &ProductDraft,
        image_url: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r"
            INSERT INTO products (category_id, name, description, price, discount_price,
                                  image_url, stock, is_available, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(draft.category_id)
            .bind(draft.name.trim())
            .bind(draft.description.trim())
            .bind(draft.price)
            .bind(draft.discount_price)
            .bind(image_url)
            .bind(draft.stock)
            .bind(draft.is_available)
            .bind(draft.is_featured)
            .fetch_one(&mut *tx)
            .await?;
        replace_links(&mut tx, product.id, &draft.option_group_ids).await?;
        tx.commit().await?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product, its image and its option group links.
    ///
    /// Returns the product as stored plus the image URL it had before, so
    /// the caller can delete a replaced image from storage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists.
    #[instrument(skip(self, draft, image), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
        image: &ImageChange,
    ) -> Result<(Product, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<String> =
            sqlx::query_scalar("SELECT image_url FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        let sql = format!(
            r"
            UPDATE products
            SET category_id = $2, name = $3, description = $4, price = $5,
                discount_price = $6, image_url = $7, stock = $8, is_available = $9,
                is_featured = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(draft.category_id)
            .bind(draft.name.trim())
            .bind(draft.description.trim())
            .bind(draft.price)
            .bind(draft.discount_price)
            .bind(image.apply(previous.clone()))
            .bind(draft.stock)
            .bind(draft.is_available)
            .bind(draft.is_featured)
            .fetch_one(&mut *tx)
            .await?;
        replace_links(&mut tx, id, &draft.option_group_ids).await?;
        tx.commit().await?;

        Ok((product, previous))
    }

    /// Delete a product. Past order lines keep their copied name and price.
    ///
    /// Returns the image URL so the caller can remove it from storage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<Option<String>, RepositoryError> {
        let image_url: Option<String> =
            sqlx::query_scalar("DELETE FROM products WHERE id = $1 RETURNING image_url")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(RepositoryError::NotFound)?;
        info!("Product deleted");
        Ok(image_url)
    }

    /// Flip the availability switch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn toggle_available(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE products SET is_available = NOT is_available, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Add `delta` (may be negative) to the stock and return the new level.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if no such product exists
    /// - `RepositoryError::Conflict` if the stock would drop below zero or
///   past the `integer` range
    #[instrument(skip(self), fields(product_id = %id, delta))]
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<i32, RepositoryError> {
        let updated: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE products SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND stock::BIGINT + $2 BETWEEN 0 AND 2147483647
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        if let Some(stock) = updated {
            info!(stock, "Stock adjusted");
            return Ok(stock);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        if exists {
            Err(RepositoryError::Conflict(
                "stock cannot go below zero or past 2147483647".to_owned(),
            ))
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductId,
    groups: &[OptionGroupId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM product_option_groups WHERE product_id = $1")
        .bind(product)
        .execute(&mut **tx)
        .await?;
    if groups.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r"
        INSERT INTO product_option_groups (product_id, group_id)
        SELECT $1, g FROM UNNEST($2::int[]) AS g
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(product)
    .bind(groups)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
