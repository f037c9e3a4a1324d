//! Dashboard route handler.

use askama::Template;
use axum::{extract::State, response::Html};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::messages::Flash;
use brewline_core::{FulfillmentType, Money, OrderStatus};

use crate::db::dashboard::{DailyRevenue, StatusCount, TodaySummary, TopProduct};
use crate::db::{DashboardRepository, OrderRepository};
use crate::filters;
use crate::middleware::{RequireStaff, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::{OrderRow, render};

/// Days covered by the revenue chart.
const REVENUE_DAYS: i32 = 7;
/// Window and size of the best seller list.
const TOP_PRODUCT_DAYS: i32 = 30;
const TOP_PRODUCT_LIMIT: i64 = 5;
const RECENT_ORDERS: i64 = 8;

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_admin: bool,
}

impl From<&CurrentStaff> for AdminUserView {
    fn from(staff: &CurrentStaff) -> Self {
        Self {
            name: staff.name.clone(),
            email: staff.email.clone(),
            role: staff.role.to_string(),
            is_admin: staff.is_admin(),
        }
    }
}

/// Headline numbers.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders_today: i64,
    pub revenue_today: String,
    pub pickup_today: i64,
    pub delivery_today: i64,
    pub customers: i64,
}

impl DashboardMetrics {
    fn new(today: &TodaySummary, customers: i64) -> Self {
        Self {
            orders_today: today.order_count,
            revenue_today: today.revenue.format(),
            pickup_today: today.pickup_count,
            delivery_today: today.delivery_count,
            customers,
        }
    }
}

/// Active order count for one status.
#[derive(Debug, Clone)]
pub struct StatusTile {
    pub label: &'static str,
    pub badge_class: &'static str,
    pub count: i64,
}

/// One bar of the revenue chart.
#[derive(Debug, Clone)]
pub struct RevenueBar {
    pub day: String,
    pub amount: String,
    /// Height relative to the best day, 0-100.
    pub percent: u32,
}

#[derive(Debug, Clone)]
pub struct TopProductView {
    pub name: String,
    pub quantity: i64,
    pub revenue: String,
}

impl From<&TopProduct> for TopProductView {
    fn from(product: &TopProduct) -> Self {
        Self {
            name: product.product_name.clone(),
            quantity: product.quantity,
            revenue: product.revenue.format(),
        }
    }
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub metrics: DashboardMetrics,
    pub status_tiles: Vec<StatusTile>,
    pub revenue_bars: Vec<RevenueBar>,
    pub week_revenue: String,
    pub top_products: Vec<TopProductView>,
    pub recent_orders: Vec<OrderRow>,
}

// =============================================================================
// Type Conversions
// =============================================================================

/// One tile per active status, zero when none are waiting.
fn status_tiles(counts: &[StatusCount]) -> Vec<StatusTile> {
    OrderStatus::ACTIVE
        .into_iter()
        .map(|status| StatusTile {
            // the generic label reads fine for both fulfillment types
            label: status.label(FulfillmentType::Pickup),
            badge_class: status.badge_class(),
            count: counts
                .iter()
                .find(|c| c.status == status)
                .map_or(0, |c| c.count),
        })
        .collect()
}

/// Scale each day against the best one.
fn revenue_bars(series: &[DailyRevenue]) -> Vec<RevenueBar> {
    let best = series
        .iter()
        .map(|d| d.revenue.amount())
        .max()
        .unwrap_or(Decimal::ZERO);
    series
        .iter()
        .map(|d| {
            let percent = if best.is_zero() {
                0
            } else {
                (d.revenue.amount() * Decimal::ONE_HUNDRED / best)
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            };
            RevenueBar {
                day: d.day.format("%a %-d").to_string(),
                amount: d.revenue.format(),
                percent,
            }
        })
        .collect()
}

fn total_revenue(series: &[DailyRevenue]) -> Money {
    let total = series.iter().map(|d| d.revenue.amount()).sum();
    Money::new(total).unwrap_or(Money::ZERO)
}

/// Dashboard page handler.
///
/// Each panel degrades to empty on its own if its query fails.
#[instrument(skip(staff, state, session))]
pub async fn dashboard(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
) -> Html<String> {
    let repo = DashboardRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());

    let (today, by_status, series, top, customers, recent) = tokio::join!(
        repo.today(),
        repo.active_by_status(),
        repo.revenue_series(REVENUE_DAYS),
        repo.top_products(TOP_PRODUCT_DAYS, TOP_PRODUCT_LIMIT),
        repo.customer_count(),
        orders.list_recent(RECENT_ORDERS),
    );

    let today = today.unwrap_or_else(|e| {
        tracing::error!("Failed to load today's summary: {e}");
        TodaySummary::default()
    });
    let by_status = by_status.unwrap_or_else(|e| {
        tracing::error!("Failed to load active order counts: {e}");
        vec![]
    });
    let series = series.unwrap_or_else(|e| {
        tracing::error!("Failed to load revenue series: {e}");
        vec![]
    });
    let top = top.unwrap_or_else(|e| {
        tracing::error!("Failed to load top products: {e}");
        vec![]
    });
    let customers = customers.unwrap_or_else(|e| {
        tracing::error!("Failed to count customers: {e}");
        0
    });
    let recent = recent.unwrap_or_else(|e| {
        tracing::error!("Failed to load recent orders: {e}");
        vec![]
    });

    let template = DashboardTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/".to_string(),
        flashes: take_flash(&session).await,
        metrics: DashboardMetrics::new(&today, customers),
        status_tiles: status_tiles(&by_status),
        week_revenue: total_revenue(&series).format(),
        revenue_bars: revenue_bars(&series),
        top_products: top.iter().map(TopProductView::from).collect(),
        recent_orders: recent.iter().map(OrderRow::from).collect(),
    };

    render(&template)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32, rupiah: u32) -> DailyRevenue {
        DailyRevenue {
            day: NaiveDate::from_ymd_opt(2026, 10, d).unwrap(),
            revenue: Money::rupiah(rupiah),
        }
    }

    #[test]
    fn test_revenue_bars_scale_to_best_day() {
        let bars = revenue_bars(&[day(14, 50_000), day(15, 200_000), day(16, 0)]);
        let percents: Vec<u32> = bars.iter().map(|b| b.percent).collect();
        assert_eq!(percents, [25, 100, 0]);
        assert_eq!(bars[1].day, "Thu 15");
        assert_eq!(bars[1].amount, "Rp 200.000");
    }

    #[test]
    fn test_empty_week_has_flat_bars() {
        let bars = revenue_bars(&[day(14, 0), day(15, 0)]);
        assert!(bars.iter().all(|b| b.percent == 0));
        assert_eq!(total_revenue(&[day(14, 0), day(15, 0)]), Money::ZERO);
        assert_eq!(
            total_revenue(&[day(14, 10_000), day(15, 5_000)]),
            Money::rupiah(15_000)
        );
    }

    #[test]
    fn test_status_tiles_fill_missing_statuses() {
        let tiles = status_tiles(&[StatusCount {
            status: OrderStatus::Ready,
            count: 3,
        }]);
        let counts: Vec<i64> = tiles.iter().map(|t| t.count).collect();
        assert_eq!(counts, [0, 0, 3]);
        assert_eq!(tiles[0].badge_class, "badge-new");
    }
}
