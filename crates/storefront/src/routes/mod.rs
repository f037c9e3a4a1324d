//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home: promos, featured, categories
//!
//! # Menu
//! GET  /menu?category=&q=             - Menu grid
//! GET  /menu/{id}                     - Product detail with options
//!
//! # Cart (HTMX fragments)
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add a configured line
//! POST /cart/update                   - Change a line's quantity
//! POST /cart/remove                   - Drop a line
//! GET  /cart/count                    - Cart count badge (fragment)
//!
//! # Checkout (requires auth)
//! GET  /checkout                      - Checkout form
//! POST /checkout                      - Place the order
//!
//! # Orders (requires auth)
//! GET  /orders                        - Order history
//! GET  /orders/{id}                   - Tracking page
//! GET  /orders/{id}/events            - SSE status stream
//! POST /orders/{id}/cancel            - Cancel while new
//!
//! # Account (requires auth)
//! GET  /account                       - Profile
//! POST /account                       - Update name and phone
//! GET  /account/addresses             - Address book
//! GET  /account/addresses/new         - New address form
//! POST /account/addresses             - Create address
//! GET  /account/addresses/{id}/edit   - Edit address form
//! POST /account/addresses/{id}        - Update address
//! POST /account/addresses/{id}/delete - Delete address
//! POST /account/addresses/{id}/default - Make default
//!
//! # Auth
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Login action
//! GET  /auth/register                 - Register page
//! POST /auth/register                 - Register action
//! POST /auth/logout                   - Logout action
//! GET  /auth/forgot                   - Password reset request page
//! POST /auth/forgot                   - Send reset mail
//! GET  /auth/oauth/{provider}         - Start OAuth (PKCE)
//! GET  /auth/callback                 - OAuth callback
//! ```

pub mod account;
pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod menu;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Form posts are rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/forgot", post(auth::forgot))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/forgot", get(auth::forgot_page))
        .route("/logout", post(auth::logout))
        .route("/oauth/{provider}", get(auth::oauth_start))
        .route("/callback", get(auth::oauth_callback))
        .merge(limited)
}

/// Create the menu routes router.
pub fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(menu::index))
        .route("/{id}", get(menu::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/", post(checkout::place))
        .layer(checkout_rate_limiter());

    Router::new().route("/", get(checkout::show)).merge(limited)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/{id}/cancel", post(orders::cancel))
        .layer(checkout_rate_limiter());

    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/events", get(orders::events))
        .merge(limited)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).post(account::update))
        .route(
            "/addresses",
            get(addresses::index).post(addresses::create),
        )
        .route("/addresses/new", get(addresses::new))
        .route("/addresses/{id}", post(addresses::update))
        .route("/addresses/{id}/edit", get(addresses::edit))
        .route("/addresses/{id}/delete", post(addresses::delete))
        .route("/addresses/{id}/default", post(addresses::make_default))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/menu", menu_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}
