//! Catalog repositories against a real database.
//!
//! Run with: cargo test -p brewline-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use brewline_admin::db::{CategoryRepository, OptionRepository, ProductRepository, RepositoryError};
use brewline_core::catalog::{CategoryDraft, OptionGroupDraft, OptionItemDraft};
use brewline_core::Money;
use brewline_integration_tests::{create_category, create_product, stock_of, test_pool, unique};

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_duplicate_category_name_is_a_conflict() {
    let pool = test_pool().await;
    let existing = create_category(&pool).await;

    let draft = CategoryDraft {
        name: existing.name.to_uppercase(),
        sort_order: 5,
        is_active: true,
    };
    let err = CategoryRepository::new(&pool)
        .create(&draft)
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_deleting_a_category_keeps_its_products() {
    let pool = test_pool().await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, 18_000, 3).await;
    sqlx::query("UPDATE products SET category_id = $2 WHERE id = $1")
        .bind(product.id)
        .bind(category.id)
        .execute(&pool)
        .await
        .unwrap();

    CategoryRepository::new(&pool).delete(category.id).await.unwrap();

    let product = ProductRepository::new(&pool).get(product.id).await.unwrap();
    assert_eq!(product.category_id, None);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_stock_adjustment_cannot_go_negative() {
    let pool = test_pool().await;
    let product = create_product(&pool, 18_000, 2).await;
    let products = ProductRepository::new(&pool);

    assert_eq!(products.adjust_stock(product.id, 5).await.unwrap(), 7);
    let err = products.adjust_stock(product.id, -8).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert_eq!(stock_of(&pool, &product).await, 7);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_stock_adjustment_past_integer_range_is_a_conflict() {
    let pool = test_pool().await;
    let product = create_product(&pool, 18_000, 2).await;
    let products = ProductRepository::new(&pool);

    let err = products.adjust_stock(product.id, i32::MAX).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert_eq!(stock_of(&pool, &product).await, 2);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_toggle_hides_and_restores_a_product() {
    let pool = test_pool().await;
    let product = create_product(&pool, 18_000, 2).await;
    let products = ProductRepository::new(&pool);

    assert!(!products.toggle_available(product.id).await.unwrap().is_available);
    assert!(products.toggle_available(product.id).await.unwrap().is_available);
}

#[tokio::test]
#[ignore = "Requires DATABASE_URL"]
async fn test_deleting_a_group_removes_its_items() {
    let pool = test_pool().await;
    let options = OptionRepository::new(&pool);
    let group = options
        .create_group(&OptionGroupDraft {
            name: unique("Sugar"),
            is_required: true,
            max_select: 1,
            sort_order: 0,
        })
        .await
        .unwrap();
    options
        .add_item(
            group.id,
            &OptionItemDraft {
                name: "Less sugar".to_owned(),
                extra_price: Money::ZERO,
                is_available: true,
                sort_order: 0,
            },
        )
        .await
        .unwrap();

    options.delete_group(group.id).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM option_items WHERE group_id = $1")
        .bind(group.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(
        options
            .groups_with_items()
            .await
            .unwrap()
            .iter()
            .all(|g| g.group.id != group.id)
    );
}
