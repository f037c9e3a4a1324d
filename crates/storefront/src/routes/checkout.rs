//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::FulfillmentType;
use brewline_core::messages::Flash;
use brewline_core::profile::Address;

use crate::db::{AddressRepository, SettingsRepository};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::models::CurrentCustomer;
use crate::routes::cart::CartView;
use crate::services::cart::{load_cart, price_cart, save_cart};
use crate::services::checkout::{CheckoutError, CheckoutForm, contact_defaults, place_order};
use crate::state::AppState;

/// Delivery address choice.
#[derive(Clone)]
pub struct AddressOption {
    pub id: i32,
    pub label: String,
    pub line: String,
    pub selected: bool,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub addresses: Vec<AddressOption>,
    pub delivery_enabled: bool,
    pub delivery_fee: String,
    pub total_pickup: String,
    pub total_delivery: String,
    pub fulfillment: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub notes: String,
    /// Form-level problems shown above the submit button.
    pub errors: Vec<String>,
}

/// Everything the form needs besides the customer's input.
async fn render(
    state: &AppState,
    session: &Session,
    customer: &CurrentCustomer,
    page: PageContext,
    form: CheckoutForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let settings = SettingsRepository::new(state.pool()).store().await?;
    if !settings.is_open {
        push_flash(session, Flash::info("We're closed right now. Please come back later.")).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let mut cart = load_cart(session).await;
    let priced = price_cart(state.pool(), &mut cart).await?;
    if !priced.removed.is_empty() {
        save_cart(session, &cart).await?;
    }
    if priced.is_empty() {
        push_flash(session, Flash::info("Your cart is empty")).await;
        return Ok(Redirect::to("/menu").into_response());
    }

    let addresses: Vec<Address> = AddressRepository::new(state.pool())
        .list(customer.id)
        .await?;
    let chosen = form.address_id.as_deref().and_then(|id| id.parse::<i32>().ok());
    let addresses = addresses
        .iter()
        .map(|a| AddressOption {
            id: a.id.as_i32(),
            label: a.label.clone(),
            line: a.one_line(),
            selected: chosen.map_or(a.is_default, |id| id == a.id.as_i32()),
        })
        .collect();

    let subtotal = priced.subtotal();
    let fulfillment = if form.fulfillment_type.is_empty() {
        FulfillmentType::Pickup.as_str().to_owned()
    } else {
        form.fulfillment_type
    };

    Ok(CheckoutTemplate {
        page,
        cart: CartView::from(&priced),
        addresses,
        delivery_enabled: settings.delivery_enabled,
        delivery_fee: settings.delivery_fee.format(),
        total_pickup: subtotal.format(),
        total_delivery: (subtotal + settings.delivery_fee).format(),
        fulfillment,
        customer_name: form.customer_name,
        customer_phone: form.customer_phone,
        notes: form.notes,
        errors,
    }
    .into_response())
}

/// Display the checkout form, prefilled from the profile.
#[instrument(skip(state, session, page, customer), fields(user_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
) -> Result<Response, AppError> {
    let (customer_name, customer_phone) = contact_defaults(&state, &customer).await?;
    let form = CheckoutForm {
        customer_name,
        customer_phone,
        ..CheckoutForm::default()
    };
    render(&state, &session, &customer, page, form, Vec::new()).await
}

/// Place the order and go to its tracking page.
#[instrument(skip(state, session, page, customer, form), fields(user_id = %customer.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    match place_order(&state, &session, &customer, &form).await {
        Ok(order) => {
            add_breadcrumb(
                "checkout",
                "Order placed",
                &[("order_number", order.order_number.as_str())],
            );
            push_flash(
                &session,
                Flash::success(format!("Thanks! Order {} is in.", order.order_number)),
            )
            .await;
            Ok(Redirect::to(&format!("/orders/{}", order.id)).into_response())
        }
        Err(CheckoutError::CartChanged(removed)) => {
            push_flash(
                &session,
                Flash::error(format!(
                    "Some items are no longer available and were removed: {}",
                    removed.join(", ")
                )),
            )
            .await;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) if e.is_customer_error() => {
            let messages = match e {
                CheckoutError::Validation(errors) => {
                    errors.errors().iter().map(|f| f.message.clone()).collect()
                }
                CheckoutError::Repository(e) => vec![AppError::from(e).user_message()],
                other => vec![other.to_string()],
            };
            render(&state, &session, &customer, page, form, messages).await
        }
        Err(CheckoutError::Session(e)) => Err(e.into()),
        Err(CheckoutError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
