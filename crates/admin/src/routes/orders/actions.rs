//! Status changes and cancellation from the board and detail page.

use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use brewline_core::messages::Flash;
use brewline_core::order::{CancelReason, Order};
use brewline_core::OrderStatus;
use brewline_platform::whatsapp::OrderEvent;

use super::{parse_order_id, return_path};
use crate::db::{CancelActor, OrderRepository};
use crate::error::AppError;
use crate::middleware::{RequireStaff, push_flash};
use crate::state::AppState;

/// Form input for moving an order forward.
#[derive(Debug, Deserialize)]
pub struct StatusFormInput {
    pub status: String,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Form input for cancelling an order.
#[derive(Debug, Deserialize)]
pub struct CancelFormInput {
    pub reason: String,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Send the customer (and shop) update without holding up the redirect.
async fn notify_change(state: &AppState, order: Order) {
    match OrderRepository::new(state.pool()).items(order.id).await {
        Ok(items) => state
            .notifier()
            .notify(OrderEvent::StatusChanged, order, items),
        Err(e) => warn!(order_id = %order.id, error = %e, "Could not load items for notification"),
    }
}

/// Move an order to the requested status.
///
/// The state machine is checked again in SQL, so a stale board gets a
/// flash instead of a silent overwrite.
#[instrument(skip(staff, state, session, input), fields(staff_id = %staff.id))]
pub async fn update_status(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Form(input): Form<StatusFormInput>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_order_id(&id)?;
    let back = return_path(input.return_to.as_deref(), id);

    let target = match input.status.parse::<OrderStatus>() {
        Ok(OrderStatus::Cancelled) => {
            push_flash(&session, Flash::error("Use the cancel form to cancel an order")).await;
            return Ok(Redirect::to(&back));
        }
        Ok(status) => status,
        Err(e) => return Err(AppError::BadRequest(e)),
    };

    match OrderRepository::new(state.pool()).transition(id, target).await {
        Ok(order) => {
            info!(order_id = %id, status = %order.status, "Order status changed");
            push_flash(
                &session,
                Flash::success(format!("{}: {}", order.order_number, order.status_label())),
            )
            .await;
            notify_change(&state, order).await;
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.status().is_server_error() {
                return Err(err);
            }
            push_flash(&session, Flash::error(err.user_message())).await;
        }
    }

    Ok(Redirect::to(&back))
}

/// Cancel order handler. Stock is restored by the repository.
#[instrument(skip(staff, state, session, input), fields(staff_id = %staff.id))]
pub async fn cancel(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Form(input): Form<CancelFormInput>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_order_id(&id)?;
    let back = return_path(input.return_to.as_deref(), id);

    let reason = match CancelReason::parse(&input.reason) {
        Ok(reason) => reason,
        Err(e) => {
            push_flash(&session, Flash::error(format!("Not cancelled: {e}"))).await;
            return Ok(Redirect::to(&back));
        }
    };

    match OrderRepository::new(state.pool())
        .cancel(id, &reason, CancelActor::Staff)
        .await
    {
        Ok(order) => {
            info!(order_id = %id, "Order cancelled by staff");
            push_flash(
                &session,
                Flash::success(format!("{} was cancelled", order.order_number)),
            )
            .await;
            notify_change(&state, order).await;
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.status().is_server_error() {
                return Err(err);
            }
            push_flash(&session, Flash::error(err.user_message())).await;
        }
    }

    Ok(Redirect::to(&back))
}
