//! API route handlers for admin.
//!
//! JSON endpoints used by the back office scripts.

pub mod whatsapp;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new().merge(whatsapp::router())
}
