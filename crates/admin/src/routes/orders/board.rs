//! Live order board, one per fulfillment type.

use std::convert::Infallible;

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{
        Html, Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::broadcast::error::RecvError;
use tower_sessions::Session;
use tracing::{instrument, warn};

use brewline_core::messages::Flash;
use brewline_core::{FulfillmentType, OrderStatus};
use brewline_platform::realtime::ChangeEvent;

use crate::db::{BoardRepository, OrderRepository, RepositoryError};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireStaff, take_flash};
use crate::routes::dashboard::AdminUserView;
use crate::state::AppState;
use crate::views::{OrderCard, OrderRow, render};

/// Finished orders listed under the board.
const RECENT_FINISHED: i64 = 10;

/// `?type=pickup|delivery`; anything else shows pickup.
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    #[serde(rename = "type")]
    pub fulfillment: Option<String>,
}

impl BoardQuery {
    fn fulfillment(&self) -> FulfillmentType {
        self.fulfillment
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(FulfillmentType::Pickup)
    }
}

/// One status column.
#[derive(Debug, Clone)]
pub struct BoardColumn {
    pub status: &'static str,
    pub label: &'static str,
    pub badge_class: &'static str,
    pub cards: Vec<OrderCard>,
}

/// The columns and the finished list; rendered into the page and pushed
/// again over SSE on every relevant change.
#[derive(Template)]
#[template(path = "orders/_columns.html")]
pub struct BoardColumnsTemplate {
    pub fulfillment: &'static str,
    pub columns: Vec<BoardColumn>,
    pub finished: Vec<OrderRow>,
}

/// Board page template.
#[derive(Template)]
#[template(path = "orders/board.html")]
pub struct OrdersBoardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub fulfillment: &'static str,
    pub columns_html: String,
}

async fn load_columns(
    pool: &PgPool,
    fulfillment: FulfillmentType,
) -> Result<BoardColumnsTemplate, RepositoryError> {
    let orders = OrderRepository::new(pool);
    let active = orders.list_board(fulfillment, &OrderStatus::ACTIVE).await?;
    let finished = orders
        .list_recent_finished(fulfillment, RECENT_FINISHED)
        .await?;

    let ids: Vec<_> = active.iter().map(|o| o.id).collect();
    let mut items = BoardRepository::new(pool).items_for(&ids).await?;

    let columns = OrderStatus::ACTIVE
        .into_iter()
        .map(|status| BoardColumn {
            status: status.as_str(),
            label: status.label(fulfillment),
            badge_class: status.badge_class(),
            cards: active
                .iter()
                .filter(|o| o.status == status)
                .map(|o| OrderCard::new(o, &items.remove(&o.id).unwrap_or_default()))
                .collect(),
        })
        .collect();

    Ok(BoardColumnsTemplate {
        fulfillment: fulfillment.as_str(),
        columns,
        finished: finished.iter().map(OrderRow::from).collect(),
    })
}

/// Whether a change should refresh the board for `fulfillment`.
fn affects_board(event: &ChangeEvent, fulfillment: FulfillmentType) -> bool {
    event.is_order()
        && event
            .fulfillment_type
            .is_none_or(|changed| changed == fulfillment)
}

/// Board page handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BoardQuery>,
) -> Result<Html<String>, AppError> {
    let fulfillment = query.fulfillment();
    let columns = load_columns(state.pool(), fulfillment).await?;
    let columns_html = columns
        .render()
        .map_err(|e| AppError::Internal(format!("board columns: {e}")))?;

    let template = OrdersBoardTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/orders".to_string(),
        flashes: take_flash(&session).await,
        fulfillment: fulfillment.as_str(),
        columns_html,
    };
    Ok(render(&template))
}

/// Stream re-rendered columns as `board` events whenever an order of
/// this type changes.
#[instrument(skip(_staff, state))]
pub async fn events(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let fulfillment = query.fulfillment();
    let pool = state.pool().clone();
    let mut changes = state.changes().subscribe();

    let stream = async_stream::stream! {
        loop {
            let relevant = match changes.recv().await {
                Ok(event) => affects_board(&event, fulfillment),
                // missed events may have touched this board
                Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => break,
            };
            if !relevant {
                continue;
            }

            let columns = match load_columns(&pool, fulfillment).await {
                Ok(columns) => columns,
                Err(e) => {
                    warn!(%fulfillment, error = %e, "Failed to reload order board");
                    continue;
                }
            };
            match columns.render() {
                Ok(html) => yield Ok(Event::default().event("board").data(html)),
                Err(e) => warn!(%fulfillment, error = %e, "Failed to render order board"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use brewline_platform::realtime::ChangeOp;

    use super::*;

    fn order_change(fulfillment: Option<FulfillmentType>) -> ChangeEvent {
        ChangeEvent {
            table: "orders".to_owned(),
            op: ChangeOp::Update,
            id: Some("7d8f5f7e-5b7e-4a8c-9c7e-3f2a1b0c9d8e".to_owned()),
            status: Some(OrderStatus::Ready),
            fulfillment_type: fulfillment,
            user_id: None,
        }
    }

    #[test]
    fn test_board_follows_its_own_fulfillment_type() {
        let delivery = order_change(Some(FulfillmentType::Delivery));
        assert!(affects_board(&delivery, FulfillmentType::Delivery));
        assert!(!affects_board(&delivery, FulfillmentType::Pickup));
        assert!(affects_board(&order_change(None), FulfillmentType::Pickup));
    }

    #[test]
    fn test_catalog_changes_are_ignored() {
        let event = ChangeEvent {
            table: "products".to_owned(),
            ..order_change(None)
        };
        assert!(!affects_board(&event, FulfillmentType::Pickup));
    }

    #[test]
    fn test_unknown_type_falls_back_to_pickup() {
        let query = BoardQuery {
            fulfillment: Some("drive-thru".to_owned()),
        };
        assert_eq!(query.fulfillment(), FulfillmentType::Pickup);
        let query = BoardQuery {
            fulfillment: Some("delivery".to_owned()),
        };
        assert_eq!(query.fulfillment(), FulfillmentType::Delivery);
    }
}
