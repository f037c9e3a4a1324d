//! Order detail page.

use askama::Template;
use axum::{
    extract::{Path, State},
    response::Html,
};
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::messages::Flash;
use brewline_core::order::CancelReason;
use brewline_core::FulfillmentType;

use super::parse_order_id;
use crate::db::OrderRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireStaff, take_flash};
use crate::routes::dashboard::AdminUserView;
use crate::state::AppState;
use crate::views::{
    OrderItemView, StatusAction, TimelineItem, format_datetime, forward_actions, render, timeline,
};

/// Order detail template.
#[derive(Template)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub id: String,
    pub order_number: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub fulfillment: &'static str,
    pub fulfillment_label: &'static str,
    pub placed_at: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    /// Link to the customer page for orders placed by an account.
    pub customer_id: Option<String>,
    pub is_delivery: bool,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub delivery_fee: String,
    pub total: String,
    pub timeline: Vec<TimelineItem>,
    pub actions: Vec<StatusAction>,
    pub can_cancel: bool,
    pub min_reason_chars: usize,
}

/// Order detail handler.
#[instrument(skip(staff, state, session))]
pub async fn show(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = parse_order_id(&id)?;
    let repo = OrderRepository::new(state.pool());
    let order = repo.get(id).await?;
    let items = repo.items(id).await?;

    let template = OrderShowTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/orders".to_string(),
        flashes: take_flash(&session).await,
        id: order.id.to_string(),
        order_number: order.order_number.clone(),
        status_label: order.status_label(),
        badge_class: order.status.badge_class(),
        fulfillment: order.fulfillment_type.as_str(),
        fulfillment_label: order.fulfillment_type.label(),
        placed_at: format_datetime(order.created_at),
        customer_name: order.customer_name.clone(),
        customer_phone: order.customer_phone.clone(),
        customer_id: order.user_id.map(|u| u.to_string()),
        is_delivery: order.fulfillment_type == FulfillmentType::Delivery,
        delivery_address: order.delivery_address.clone(),
        notes: order.notes.clone(),
        cancel_reason: order.cancel_reason.clone(),
        items: items.iter().map(OrderItemView::from).collect(),
        subtotal: order.subtotal.format(),
        delivery_fee: order.delivery_fee.format(),
        total: order.total.format(),
        timeline: timeline(&order),
        actions: forward_actions(&order),
        can_cancel: order.status.is_cancellable(),
        min_reason_chars: CancelReason::MIN_CHARS,
    };
    Ok(render(&template))
}
