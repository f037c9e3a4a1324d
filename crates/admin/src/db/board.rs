//! Line items for the order board, loaded for many orders at once.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use brewline_core::OrderId;
use brewline_core::order::OrderItem;

use super::RepositoryError;

pub struct BoardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BoardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Items of every given order, keyed by order. Orders without items
    /// are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_for(
        &self,
        orders: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        if orders.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = orders.iter().map(OrderId::as_uuid).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity, options, note,
                   line_total
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}
