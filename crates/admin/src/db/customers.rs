//! Customer directory: profiles with their order history totals.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brewline_core::profile::{Address, Profile};
use brewline_core::{Money, UserId};

use super::RepositoryError;

/// Profile plus order statistics. Spend only counts completed orders.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerSummary {
    #[sqlx(flatten)]
    pub profile: Profile,
    pub order_count: i64,
    pub total_spent: Money,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct CustomerPage {
    pub customers: Vec<CustomerSummary>,
    pub total: i64,
}

const SUMMARY_SELECT: &str = r"
    SELECT p.id, p.full_name, p.email, p.phone, p.role, p.avatar_url, p.created_at,
           COUNT(o.id) AS order_count,
           COALESCE(SUM(o.total) FILTER (WHERE o.status = 'completed'), 0) AS total_spent,
           MAX(o.created_at) AS last_order_at
    FROM profiles p
    LEFT JOIN orders o ON o.user_id = p.id
";

pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search by name, email or phone, newest accounts first.
    ///
    /// `page` is zero-based.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn search(
        &self,
        query: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<CustomerPage, RepositoryError> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.replace('%', "\\%").replace('_', "\\_")));
        let filter = "WHERE $1::text IS NULL OR p.full_name ILIKE $1 OR p.email ILIKE $1 \
                      OR p.phone ILIKE $1";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM profiles p {filter}"))
            .bind(&pattern)
            .fetch_one(self.pool)
            .await?;

        let sql = format!(
            "{SUMMARY_SELECT} {filter} GROUP BY p.id ORDER BY p.created_at DESC LIMIT $2 OFFSET $3"
        );
        let customers = sqlx::query_as::<_, CustomerSummary>(&sql)
            .bind(&pattern)
            .bind(per_page)
            .bind(page.max(0) * per_page)
            .fetch_all(self.pool)
            .await?;

        Ok(CustomerPage { customers, total })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such profile exists.
    pub async fn get(&self, id: UserId) -> Result<CustomerSummary, RepositoryError> {
        let sql = format!("{SUMMARY_SELECT} WHERE p.id = $1 GROUP BY p.id");
        sqlx::query_as::<_, CustomerSummary>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// The customer's saved addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn addresses(&self, id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(
            r"
            SELECT id, user_id, label, recipient_name, phone, street, city, postal_code, notes,
                   is_default
            FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }
}
