//! Aggregates for the dashboard.
//!
//! Day boundaries are taken in the shop's time zone so "today" matches
//! the counter, not UTC.

use chrono::NaiveDate;
use sqlx::PgPool;

use brewline_core::{FulfillmentType, Money, OrderStatus};

use super::RepositoryError;

/// IANA zone of the shop.
pub const SHOP_TIME_ZONE: &str = "Asia/Jakarta";

/// Today's headline numbers.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct TodaySummary {
    /// Orders placed today, cancelled ones included.
    pub order_count: i64,
    /// Total of orders completed today.
    pub revenue: Money,
    pub pickup_count: i64,
    pub delivery_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: Money,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopProduct {
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Money,
}

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn today(&self) -> Result<TodaySummary, RepositoryError> {
        let summary = sqlx::query_as::<_, TodaySummary>(
            r"
            WITH today AS (SELECT (NOW() AT TIME ZONE $1)::date AS day)
            SELECT
                COUNT(*) FILTER (WHERE (o.created_at AT TIME ZONE $1)::date = t.day)
                    AS order_count,
                COALESCE(SUM(o.total) FILTER (
                    WHERE o.status = 'completed' AND (o.completed_at AT TIME ZONE $1)::date = t.day
                ), 0) AS revenue,
                COUNT(*) FILTER (
                    WHERE (o.created_at AT TIME ZONE $1)::date = t.day
                      AND o.fulfillment_type = $2
                ) AS pickup_count,
                COUNT(*) FILTER (
                    WHERE (o.created_at AT TIME ZONE $1)::date = t.day
                      AND o.fulfillment_type = $3
                ) AS delivery_count
            FROM today t
            LEFT JOIN orders o
                ON o.created_at >= NOW() - INTERVAL '2 days'
                OR o.completed_at >= NOW() - INTERVAL '2 days'
            ",
        )
        .bind(SHOP_TIME_ZONE)
        .bind(FulfillmentType::Pickup)
        .bind(FulfillmentType::Delivery)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Count of active orders per status; statuses with none are left out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r"
            SELECT status, COUNT(*) AS count
            FROM orders
            WHERE status IN ('new', 'processing', 'ready')
            GROUP BY status
            ORDER BY status
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }

    /// Completed-order revenue for each of the last `days` days, oldest
    /// first, with zero for days without sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_series(&self, days: i32) -> Result<Vec<DailyRevenue>, RepositoryError> {
        let series = sqlx::query_as::<_, DailyRevenue>(
            r"
            WITH days AS (
                SELECT generate_series(
                    (NOW() AT TIME ZONE $1)::date - ($2 - 1),
                    (NOW() AT TIME ZONE $1)::date,
                    INTERVAL '1 day'
                )::date AS day
            )
            SELECT d.day, COALESCE(SUM(o.total), 0) AS revenue
            FROM days d
            LEFT JOIN orders o
                ON o.status = 'completed' AND (o.completed_at AT TIME ZONE $1)::date = d.day
            GROUP BY d.day
            ORDER BY d.day
            ",
        )
        .bind(SHOP_TIME_ZONE)
        .bind(days.max(1))
        .fetch_all(self.pool)
        .await?;
        Ok(series)
    }

    /// Best sellers by quantity over the last `days` days, cancelled
    /// orders excluded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        days: i32,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let products = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT i.product_name, SUM(i.quantity)::bigint AS quantity,
                   SUM(i.line_total) AS revenue
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status <> 'cancelled'
              AND o.created_at >= NOW() - make_interval(days => $1)
            GROUP BY i.product_name
            ORDER BY quantity DESC, revenue DESC
            LIMIT $2
            ",
        )
        .bind(days)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Number of customer accounts (staff excluded).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE role = 'customer'")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
