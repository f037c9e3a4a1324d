//! Order history, tracking and customer cancellation.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{
        IntoResponse, Redirect, Response, Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use brewline_core::messages::Flash;
use brewline_core::order::{CancelReason, Order, OrderItem};
use brewline_core::{FulfillmentType, OrderId, OrderStatus};
use brewline_platform::db::RepositoryError;
use brewline_platform::db::orders::CancelActor;
use brewline_platform::whatsapp::OrderEvent;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::state::AppState;
use crate::views::{OrderSummary, TimelineItem, format_datetime, timeline};

/// Orders shown in the history list.
const HISTORY_LIMIT: i64 = 50;

// =============================================================================
// Templates
// =============================================================================

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderSummary>,
}

/// Line item display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub options: String,
    pub note: Option<String>,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            options: item.options_summary(),
            note: item.note.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.format(),
            line_total: item.line_total.format(),
        }
    }
}

/// Tracking page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: OrderSummary,
    /// Pre-rendered [`TrackingTemplate`], replaced live over SSE.
    pub tracking: String,
    pub items: Vec<OrderItemView>,
    pub is_delivery: bool,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub subtotal: String,
    pub delivery_fee: String,
    pub can_cancel: bool,
    /// Closed orders need no live updates.
    pub live: bool,
}

/// Status badge and timeline, rendered inline and pushed over SSE.
#[derive(Template, WebTemplate)]
#[template(path = "partials/order_tracking.html")]
pub struct TrackingTemplate {
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub steps: Vec<TimelineItem>,
    pub cancel_reason: Option<String>,
    pub updated_at: String,
}

impl From<&Order> for TrackingTemplate {
    fn from(order: &Order) -> Self {
        Self {
            status_label: order.status_label(),
            badge_class: order.status.badge_class(),
            steps: timeline(order),
            cancel_reason: order.cancel_reason.clone(),
            updated_at: format_datetime(order.updated_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelForm {
    pub reason: String,
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse::<OrderId>()
        .map_err(|_| AppError::NotFound(format!("order {raw}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the customer's order history.
#[instrument(skip(state, customer, page), fields(user_id = %customer.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
) -> Result<OrdersIndexTemplate, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(customer.id, HISTORY_LIMIT)
        .await?;
    Ok(OrdersIndexTemplate {
        page,
        orders: orders.iter().map(OrderSummary::from).collect(),
    })
}

/// Display the tracking page. Only the owner may view it.
#[instrument(skip(state, customer, page), fields(user_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<OrderShowTemplate, AppError> {
    let id = parse_order_id(&id)?;
    let repo = OrderRepository::new(state.pool());
    let order = repo.get_for_user(id, customer.id).await?;
    let items = repo.items(id).await?;

    Ok(OrderShowTemplate {
        page,
        tracking: TrackingTemplate::from(&order)
            .render()
            .map_err(|e| AppError::Internal(format!("tracking fragment: {e}")))?,
        items: items.iter().map(OrderItemView::from).collect(),
        is_delivery: order.fulfillment_type == FulfillmentType::Delivery,
        customer_name: order.customer_name.clone(),
        customer_phone: order.customer_phone.clone(),
        delivery_address: order.delivery_address.clone(),
        notes: order.notes.clone(),
        subtotal: order.subtotal.format(),
        delivery_fee: order.delivery_fee.format(),
        can_cancel: order.status == OrderStatus::New,
        live: !order.status.is_terminal(),
        order: OrderSummary::from(&order),
    })
}

/// Stream status changes for one order as `status` events carrying the
/// re-rendered tracking fragment.
///
/// The stream ends once the order reaches a terminal status, and the
/// subscription is dropped as soon as the browser disconnects.
#[instrument(skip(state, customer), fields(user_id = %customer.id))]
pub async fn events(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let id = parse_order_id(&id)?;
    let order = OrderRepository::new(state.pool())
        .get_for_user(id, customer.id)
        .await?;

    let pool = state.pool().clone();
    let mut changes = state.changes().subscribe();
    let finished = order.status.is_terminal();

    let stream = async_stream::stream! {
        let mut open = !finished;
        while open {
            let relevant = match changes.recv().await {
                Ok(event) => event.concerns_order(id.as_uuid()),
                // a missed event may have been ours
                Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => break,
            };
            if !relevant {
                continue;
            }

            let order = match OrderRepository::new(&pool).get(id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Failed to reload order for tracking");
                    continue;
                }
            };
            match TrackingTemplate::from(&order).render() {
                Ok(html) => yield Ok(Event::default().event("status").data(html)),
                Err(e) => warn!(order_id = %id, error = %e, "Failed to render tracking fragment"),
            }
            if order.status.is_terminal() {
                debug!(order_id = %id, status = %order.status, "Order closed, ending stream");
                open = false;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Cancel an order that has not been started yet.
#[instrument(skip(state, session, customer, form), fields(user_id = %customer.id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
    Form(form): Form<CancelForm>,
) -> Result<Response, AppError> {
    let id = parse_order_id(&id)?;
    let back = format!("/orders/{id}");

    let reason = match CancelReason::parse(&form.reason) {
        Ok(reason) => reason,
        Err(e) => {
            push_flash(&session, Flash::error(e.to_string())).await;
            return Ok(Redirect::to(&back).into_response());
        }
    };

    let repo = OrderRepository::new(state.pool());
    match repo
        .cancel(id, &reason, CancelActor::Customer(customer.id))
        .await
    {
        Ok(order) => {
            push_flash(&session, Flash::success("Your order was cancelled")).await;
            match repo.items(id).await {
                Ok(items) => state
                    .notifier()
                    .notify(OrderEvent::StatusChanged, order, items),
                Err(e) => warn!(error = %e, "Could not load items for notification"),
            }
        }
        Err(RepositoryError::Transition(_)) => {
            push_flash(
                &session,
                Flash::error("The shop has already started on this order, so it can't be cancelled here"),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&back).into_response())
}
