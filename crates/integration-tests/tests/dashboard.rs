//! Dashboard aggregates against a real database.
//!
//! Run with: cargo test -p brewline-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use brewline_admin::db::{DashboardRepository, OrderRepository};
use brewline_core::OrderStatus;
use brewline_integration_tests::{create_customer, create_product, pickup_order, test_pool};

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_old_order_completed_today_counts_as_todays_revenue() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let product = create_product(&pool, 30_000, 3).await;
    let orders = OrderRepository::new(&pool);

    let order = orders
        .create(&pickup_order(&customer, &product, 1))
        .await
        .unwrap();
    for status in [OrderStatus::Processing, OrderStatus::Ready, OrderStatus::Completed] {
        orders.transition(order.id, status).await.unwrap();
    }

    let dashboard = DashboardRepository::new(&pool);
    let before = dashboard.today().await.unwrap().revenue;
    assert!(before >= order.total);

    // Placed days ago, completed just now.
    sqlx::query("UPDATE orders SET created_at = NOW() - INTERVAL '5 days' WHERE id = $1")
        .bind(order.id)
        .execute(&pool)
        .await
        .unwrap();

    let after = dashboard.today().await.unwrap().revenue;
    assert!(after >= before, "revenue dropped from {before:?} to {after:?}");
}
