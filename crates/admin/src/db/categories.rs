//! Menu category writes.

use sqlx::PgPool;
use tracing::instrument;

use brewline_core::CategoryId;
use brewline_core::catalog::{Category, CategoryDraft};

use super::RepositoryError;

const CATEGORY_COLUMNS: &str = "id, name, slug, sort_order, is_active";

/// Category with the number of products filed under it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryListing {
    #[sqlx(flatten)]
    pub category: Category,
    pub product_count: i64,
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every category, hidden ones included, in menu order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<CategoryListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryListing>(
            r"
            SELECT c.id, c.name, c.slug, c.sort_order, c.is_active,
                   COUNT(p.id) AS product_count
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.sort_order, c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Plain list for select boxes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such category exists.
    pub async fn get(&self, id: CategoryId) -> Result<Category, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another category already has
    /// the same slug.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: &CategoryDraft) -> Result<Category, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO categories (name, slug, sort_order, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {CATEGORY_COLUMNS}
            "
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(draft.name.trim())
            .bind(draft.slug())
            .bind(draft.sort_order)
            .bind(draft.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "a category with this name"))
    }

    /// Renaming also changes the slug, so old category links stop working.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    #[instrument(skip(self, draft), fields(category_id = %id))]
    pub async fn update(
        &self,
        id: CategoryId,
        draft: &CategoryDraft,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            r"
            UPDATE categories
            SET name = $2, slug = $3, sort_order = $4, is_active = $5
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(draft.name.trim())
            .bind(draft.slug())
            .bind(draft.sort_order)
            .bind(draft.is_active)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "a category with this name"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Products in the category become uncategorised.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such category exists.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
