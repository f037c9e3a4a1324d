//! Order placement and lifecycle.
//!
//! Every status change goes through [`OrderRepository::transition`] or
//! [`OrderRepository::cancel`], which check the core state machine and then
//! update with a `WHERE status = <current>` guard so two baristas pressing
//! buttons at once cannot skip a step.

use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{info, instrument};

use brewline_core::order::{CancelReason, NewOrder, Order, OrderItem, OrderNumber};
use brewline_core::{FulfillmentType, OrderId, OrderStatus, TransitionError, UserId};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_phone, \
    fulfillment_type, delivery_address, subtotal, delivery_fee, total, status, notes, \
    cancel_reason, created_at, updated_at, processing_at, ready_at, completed_at, cancelled_at";

/// Who is cancelling; customers may only cancel their own brand-new orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelActor {
    Customer(UserId),
    Staff,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reserve stock, number and insert an order in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::OutOfStock` naming the first product without
    /// enough stock (nothing is written in that case), or
    /// `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, order), fields(user_id = %order.user_id, lines = order.lines.len()))]
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for line in &order.lines {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::OutOfStock(line.product_name.clone()))?;
            let reserved = sqlx::query(
                r"
                UPDATE products
                SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND is_available AND stock >= $2
                ",
            )
            .bind(line.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                return Err(RepositoryError::OutOfStock(line.product_name.clone()));
            }
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let number = OrderNumber::new(Utc::now().date_naive(), sequence);

        let insert = format!(
            r"
            INSERT INTO orders (
                order_number, user_id, customer_name, customer_phone, fulfillment_type,
                delivery_address, subtotal, delivery_fee, total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let created = sqlx::query_as::<_, Order>(&insert)
            .bind(number.as_str())
            .bind(order.user_id)
            .bind(order.customer_name.trim())
            .bind(order.customer_phone.as_ref().map(|p| p.as_str().to_owned()))
            .bind(order.fulfillment_type)
            .bind(order.delivery_address.as_deref())
            .bind(order.totals.subtotal)
            .bind(order.totals.delivery_fee)
            .bind(order.totals.total)
            .bind(order.notes.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        for line in &order.lines {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::OutOfStock(line.product_name.clone()))?;
            sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, unit_price, quantity, options, note, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(created.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(quantity)
            .bind(Json(&line.options))
            .bind(line.note.as_deref())
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(order_id = %created.id, order_number = %created.order_number, "Order placed");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such order exists.
    pub async fn get(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Fetch an order only if it belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for missing or foreign orders.
    pub async fn get_for_user(&self, id: OrderId, user: UserId) -> Result<Order, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity, options, note, line_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    /// Latest orders across all customers, for the back office dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    /// Orders of one fulfillment type in the given statuses, oldest first so
    /// the queue reads top to bottom.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_board(
        &self,
        fulfillment: FulfillmentType,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, RepositoryError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_owned()).collect();
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE fulfillment_type = $1 AND status::text = ANY($2)
            ORDER BY created_at
            "
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(fulfillment)
            .bind(statuses)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    /// Completed or cancelled orders of one type, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent_finished(
        &self,
        fulfillment: FulfillmentType,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE fulfillment_type = $1 AND status IN ('completed', 'cancelled')
            ORDER BY updated_at DESC
            LIMIT $2
            "
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(fulfillment)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    /// Move an order forward (`processing`, `ready` or `completed`).
    ///
    /// Cancellation needs a reason and a stock refund, so it goes through
    /// [`Self::cancel`] instead.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist
    /// - `RepositoryError::Transition` if the state machine forbids the move
    /// - `RepositoryError::Conflict` if the order changed concurrently
    #[instrument(skip(self), fields(order_id = %id, to = %to))]
    pub async fn transition(&self, id: OrderId, to: OrderStatus) -> Result<Order, RepositoryError> {
        let current: OrderStatus = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let stamp = match to {
            OrderStatus::Processing => "processing_at",
            OrderStatus::Ready => "ready_at",
            OrderStatus::Completed => "completed_at",
            OrderStatus::New | OrderStatus::Cancelled => {
                return Err(TransitionError { from: current, to }.into());
            }
        };
        current.transition_to(to)?;

        let sql = format!(
            r"
            UPDATE orders
            SET status = $2, {stamp} = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING {ORDER_COLUMNS}
            "
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(to)
            .bind(current)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| {
                RepositoryError::Conflict("order was updated by someone else".to_owned())
            })?;

        info!(from = %current, "Order status changed");
        Ok(updated)
    }

    /// Cancel an order and put its items back into stock.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist or, for a
    ///   customer, is not theirs
    /// - `RepositoryError::Transition` if the order can no longer be
    ///   cancelled (customers: anything past `new`)
    #[instrument(skip(self, reason), fields(order_id = %id, actor = ?actor))]
    pub async fn cancel(
        &self,
        id: OrderId,
        reason: &CancelReason,
        actor: CancelActor,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (status, owner): (OrderStatus, Option<UserId>) =
            sqlx::query_as("SELECT status, user_id FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if let CancelActor::Customer(user) = actor {
            if owner != Some(user) {
                return Err(RepositoryError::NotFound);
            }
            if status != OrderStatus::New {
                return Err(TransitionError {
                    from: status,
                    to: OrderStatus::Cancelled,
                }
                .into());
            }
        }
        status.transition_to(OrderStatus::Cancelled)?;

        let sql = format!(
            r"
            UPDATE orders
            SET status = 'cancelled', cancel_reason = $2, cancelled_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let cancelled = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(reason.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let restocked = sqlx::query(
            r"
            UPDATE products p
            SET stock = p.stock + i.quantity, updated_at = NOW()
            FROM (
                SELECT product_id, SUM(quantity) AS quantity
                FROM order_items
                WHERE order_id = $1 AND product_id IS NOT NULL
                GROUP BY product_id
            ) i
            WHERE p.id = i.product_id
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            products_restocked = restocked.rows_affected(),
            "Order cancelled and stock restored"
        );
        Ok(cancelled)
    }
}
