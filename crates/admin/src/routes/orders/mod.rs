//! Order handling route handlers.
//!
//! This module contains the live board per fulfillment type, the order
//! detail page and the status and cancel actions.

mod actions;
mod board;
mod detail;

pub use actions::{CancelFormInput, StatusFormInput, cancel, update_status};
pub use board::{BoardColumn, BoardColumnsTemplate, BoardQuery, OrdersBoardTemplate, events, index};
pub use detail::{OrderShowTemplate, show};

use brewline_core::OrderId;

use crate::error::AppError;

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse::<OrderId>()
        .map_err(|_| AppError::NotFound(format!("order {raw}")))
}

/// Only board and detail pages are valid places to return to.
fn return_path(requested: Option<&str>, id: OrderId) -> String {
    match requested {
        Some(path) if path.starts_with("/orders") && !path.contains('\\') => path.to_owned(),
        _ => format!("/orders/{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_path_stays_on_order_pages() {
        let id = OrderId::generate();
        assert_eq!(
            return_path(Some("/orders?type=delivery"), id),
            "/orders?type=delivery"
        );
        assert_eq!(return_path(Some("https://evil.test/orders"), id), format!("/orders/{id}"));
        assert_eq!(return_path(Some("/customers"), id), format!("/orders/{id}"));
        assert_eq!(return_path(None, id), format!("/orders/{id}"));
    }

    #[test]
    fn test_bad_order_id_is_not_found() {
        assert!(matches!(
            parse_order_id("BRW-261016-0001"),
            Err(AppError::NotFound(_))
        ));
    }
}
