//! Option groups (sugar level, toppings) and their items.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::instrument;

use brewline_core::catalog::{
    OptionGroup, OptionGroupDraft, OptionGroupWithItems, OptionItem, OptionItemDraft,
};
use brewline_core::{OptionGroupId, OptionItemId};

use super::RepositoryError;

const GROUP_COLUMNS: &str = "id, name, is_required, max_select, sort_order";
const ITEM_COLUMNS: &str = "id, group_id, name, extra_price, is_available, sort_order";

pub struct OptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OptionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Groups in display order, for the product form checkboxes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn groups(&self) -> Result<Vec<OptionGroup>, RepositoryError> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM option_groups ORDER BY sort_order, name");
        let groups = sqlx::query_as::<_, OptionGroup>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(groups)
    }

    /// Every group with all its items, unavailable ones included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn groups_with_items(&self) -> Result<Vec<OptionGroupWithItems>, RepositoryError> {
        let groups = self.groups().await?;
        let sql = format!("SELECT {ITEM_COLUMNS} FROM option_items ORDER BY sort_order, name");
        let items = sqlx::query_as::<_, OptionItem>(&sql)
            .fetch_all(self.pool)
            .await?;

        let mut by_group: HashMap<OptionGroupId, Vec<OptionItem>> = HashMap::new();
        for item in items {
            by_group.entry(item.group_id).or_default().push(item);
        }
        Ok(groups
            .into_iter()
            .map(|group| OptionGroupWithItems {
                items: by_group.remove(&group.id).unwrap_or_default(),
                group,
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_group(&self, draft: &OptionGroupDraft) -> Result<OptionGroup, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO option_groups (name, is_required, max_select, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING {GROUP_COLUMNS}
            "
        );
        let group = sqlx::query_as::<_, OptionGroup>(&sql)
            .bind(draft.name.trim())
            .bind(draft.is_required)
            .bind(draft.max_select)
            .bind(draft.sort_order)
            .fetch_one(self.pool)
            .await?;
        Ok(group)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such group exists.
    #[instrument(skip(self, draft), fields(group_id = %id))]
    pub async fn update_group(
        &self,
        id: OptionGroupId,
        draft: &OptionGroupDraft,
    ) -> Result<OptionGroup, RepositoryError> {
        let sql = format!(
            r"
            UPDATE option_groups
            SET name = $2, is_required = $3, max_select = $4, sort_order = $5
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "
        );
        sqlx::query_as::<_, OptionGroup>(&sql)
            .bind(id)
            .bind(draft.name.trim())
            .bind(draft.is_required)
            .bind(draft.max_select)
            .bind(draft.sort_order)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Deletes the group's items and unlinks it from every product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such group exists.
    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn delete_group(&self, id: OptionGroupId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM option_groups WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the group does not exist.
    #[instrument(skip(self, draft), fields(group_id = %group, name = %draft.name))]
    pub async fn add_item(
        &self,
        group: OptionGroupId,
        draft: &OptionItemDraft,
    ) -> Result<OptionItem, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO option_items (group_id, name, extra_price, is_available, sort_order)
            SELECT id, $2, $3, $4, $5 FROM option_groups WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "
        );
        sqlx::query_as::<_, OptionItem>(&sql)
            .bind(group)
            .bind(draft.name.trim())
            .bind(draft.extra_price)
            .bind(draft.is_available)
            .bind(draft.sort_order)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such item exists.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete_item(&self, id: OptionItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM option_items WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
