//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! GET  /auth/login                      - Login page
//! POST /auth/login                      - Email/password login (staff roles only)
//! POST /auth/logout                     - Logout
//!
//! # Dashboard (staff)
//! GET  /                                - Today's numbers, revenue, top products
//!
//! # Orders (staff)
//! GET  /orders?type=pickup|delivery     - Live board
//! GET  /orders/events?type=             - SSE board refresh
//! GET  /orders/{id}                     - Order detail
//! POST /orders/{id}/status              - Move to the next status
//! POST /orders/{id}/cancel              - Cancel with a reason
//!
//! # Catalog (admin)
//! GET  /products                        - Product list
//! GET  /products/new                    - New product form
//! POST /products                        - Create product (multipart)
//! GET  /products/{id}/edit              - Edit product form
//! POST /products/{id}                   - Update product (multipart)
//! POST /products/{id}/delete            - Delete product
//! POST /products/{id}/toggle            - Toggle availability
//! POST /products/{id}/stock             - Adjust stock
//! GET  /categories                      - Categories with create form
//! POST /categories                      - Create category
//! GET  /categories/{id}/edit            - Edit category form
//! POST /categories/{id}                 - Update category
//! POST /categories/{id}/delete          - Delete category
//! GET  /options                         - Option groups and items
//! POST /options/groups                  - Create group
//! POST /options/groups/{id}             - Update group
//! POST /options/groups/{id}/delete      - Delete group
//! POST /options/groups/{id}/items       - Add item
//! POST /options/items/{id}/delete       - Delete item
//! GET  /promos                          - Promo banners
//! GET  /promos/new                      - New promo form
//! POST /promos                          - Create promo (multipart)
//! GET  /promos/{id}/edit                - Edit promo form
//! POST /promos/{id}                     - Update promo (multipart)
//! POST /promos/{id}/delete              - Delete promo
//! POST /promos/{id}/toggle              - Toggle active
//!
//! # Customers (staff)
//! GET  /customers?q=&page=              - Customer directory
//! GET  /customers/{id}                  - Customer detail
//!
//! # Settings (admin)
//! GET  /settings                        - Store settings and WhatsApp panel
//! POST /settings                        - Save store settings
//!
//! # API (admin, JSON)
//! GET  /api/whatsapp/status             - Latest gateway status
//! GET  /api/whatsapp/qr                 - Pairing QR code
//! POST /api/whatsapp/login              - Start pairing
//! POST /api/whatsapp/logout             - Unpair
//! ```

pub mod api;
pub mod auth;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod forms;
pub mod options;
pub mod orders;
pub mod products;
pub mod promos;
pub mod settings;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;
use forms::UPLOAD_BODY_LIMIT;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/events", get(orders::events))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the product routes router. Create and update take an image.
pub fn product_routes() -> Router<AppState> {
    let uploads = Router::new()
        .route("/", post(products::create))
        .route("/{id}", post(products::update))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/", get(products::index))
        .route("/new", get(products::new))
        .route("/{id}/edit", get(products::edit))
        .route("/{id}/delete", post(products::delete))
        .route("/{id}/toggle", post(products::toggle))
        .route("/{id}/stock", post(products::adjust_stock))
        .merge(uploads)
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/{id}", post(categories::update))
        .route("/{id}/edit", get(categories::edit))
        .route("/{id}/delete", post(categories::delete))
}

/// Create the option group routes router.
pub fn option_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(options::index))
        .route("/groups", post(options::create_group))
        .route("/groups/{id}", post(options::update_group))
        .route("/groups/{id}/delete", post(options::delete_group))
        .route("/groups/{id}/items", post(options::add_item))
        .route("/items/{id}/delete", post(options::delete_item))
}

/// Create the promo routes router.
pub fn promo_routes() -> Router<AppState> {
    let uploads = Router::new()
        .route("/", post(promos::create))
        .route("/{id}", post(promos::update))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/", get(promos::index))
        .route("/new", get(promos::new))
        .route("/{id}/edit", get(promos::edit))
        .route("/{id}/delete", post(promos::delete))
        .route("/{id}/toggle", post(promos::toggle))
        .merge(uploads)
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index))
        .route("/{id}", get(customers::show))
}

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .merge(auth::router())
        .merge(api::router())
        .nest("/orders", order_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/options", option_routes())
        .nest("/promos", promo_routes())
        .nest("/customers", customer_routes())
        .route(
            "/settings",
            get(settings::index).post(settings::update),
        )
}
