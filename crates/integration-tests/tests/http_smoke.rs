//! Smoke tests against running servers.
//!
//! These tests require both binaries running against a migrated database:
//! - cargo run -p brewline-storefront
//! - cargo run -p brewline-admin
//!
//! Run with: cargo test -p brewline-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use reqwest::header::LOCATION;

use brewline_integration_tests::{admin_base_url, http_client, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_both_servers_are_ready() {
    let client = http_client();
    for base in [storefront_base_url(), admin_base_url()] {
        let resp = client
            .get(format!("{base}/health/ready"))
            .send()
            .await
            .expect("server should be reachable");
        assert_eq!(resp.status(), StatusCode::OK, "{base}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_storefront_menu_is_public() {
    let resp = http_client()
        .get(storefront_base_url())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<html"));
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_admin_pages_require_sign_in() {
    let client = http_client();
    let base = admin_base_url();

    let resp = client.get(format!("{base}/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/auth/login");

    let resp = client
        .get(format!("{base}/api/whatsapp/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers"]
async fn test_admin_rejects_wrong_password() {
    let resp = http_client()
        .post(format!("{}/auth/login", admin_base_url()))
        .form(&[("email", "nobody@example.com"), ("password", "wrong-password")])
        .send()
        .await
        .unwrap();

    // Bad credentials re-render the login page with an inline error
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("form-error"));
}
