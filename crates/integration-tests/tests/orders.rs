//! Order placement, status changes and cancellation against a real
//! database.
//!
//! Run with: cargo test -p brewline-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use brewline_core::OrderStatus;
use brewline_core::order::CancelReason;
use brewline_integration_tests::{
    create_customer, create_product, pickup_order, stock_of, test_pool,
};
use brewline_platform::db::orders::CancelActor;
use brewline_platform::db::{OrderRepository, RepositoryError};

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_placing_an_order_reserves_stock() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let product = create_product(&pool, 25_000, 5).await;

    let order = OrderRepository::new(&pool)
        .create(&pickup_order(&customer, &product, 2))
        .await
        .expect("order should be placed");

    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.total.format(), "Rp 50.000");
    assert_eq!(stock_of(&pool, &product).await, 3);

    let items = OrderRepository::new(&pool).items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, product.name);
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_out_of_stock_order_writes_nothing() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let product = create_product(&pool, 25_000, 1).await;
    let orders = OrderRepository::new(&pool);

    let err = orders
        .create(&pickup_order(&customer, &product, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::OutOfStock(name) if name == product.name));
    assert_eq!(stock_of(&pool, &product).await, 1);
    assert!(orders.list_for_user(customer.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_status_walks_forward_and_never_back() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let product = create_product(&pool, 20_000, 5).await;
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create(&pickup_order(&customer, &product, 1))
        .await
        .unwrap();

    let processing = orders
        .transition(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert!(processing.processing_at.is_some());

    let err = orders
        .transition(order.id, OrderStatus::New)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Transition(_)));

    orders.transition(order.id, OrderStatus::Ready).await.unwrap();
    let completed = orders
        .transition(order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.completed_at.is_some());
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_staff_cancel_restores_stock() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let product = create_product(&pool, 20_000, 4).await;
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create(&pickup_order(&customer, &product, 3))
        .await
        .unwrap();
    orders
        .transition(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(stock_of(&pool, &product).await, 1);

    let reason = CancelReason::parse("Milk ran out this morning").unwrap();
    let cancelled = orders
        .cancel(order.id, &reason, CancelActor::Staff)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Milk ran out this morning"));
    assert_eq!(stock_of(&pool, &product).await, 4);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_customer_cannot_cancel_once_processing() {
    let pool = test_pool().await;
    let customer = create_customer(&pool).await;
    let stranger = create_customer(&pool).await;
    let product = create_product(&pool, 20_000, 4).await;
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create(&pickup_order(&customer, &product, 1))
        .await
        .unwrap();
    let reason = CancelReason::parse("Changed my mind, sorry").unwrap();

    // Someone else's order looks missing.
    let err = orders
        .cancel(order.id, &reason, CancelActor::Customer(stranger.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));

    orders
        .transition(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    let err = orders
        .cancel(order.id, &reason, CancelActor::Customer(customer.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Transition(_)));
    assert_eq!(stock_of(&pool, &product).await, 3);
}
