//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::messages::Flash;
use brewline_core::profile::ProfileUpdate;

use crate::db::{AddressRepository, ProfileRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;

/// Profile form data.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub page: PageContext,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub default_address: Option<String>,
    pub address_count: usize,
    pub name_error: Option<String>,
    pub phone_error: Option<String>,
}

async fn render(
    state: &AppState,
    customer: &CurrentCustomer,
    page: PageContext,
    form: Option<ProfileForm>,
    errors: Option<&brewline_core::validation::ValidationError>,
) -> Result<AccountTemplate, AppError> {
    let profile = ProfileRepository::new(state.pool())
        .get(customer.id)
        .await?;
    let addresses = AddressRepository::new(state.pool())
        .list(customer.id)
        .await?;

    let form = form.unwrap_or_else(|| ProfileForm {
        full_name: profile
            .as_ref()
            .map_or_else(|| customer.name.clone(), |p| p.full_name.clone()),
        phone: profile
            .as_ref()
            .and_then(|p| p.phone.clone())
            .unwrap_or_default(),
    });

    Ok(AccountTemplate {
        page,
        email: profile
            .and_then(|p| p.email)
            .or_else(|| customer.email.clone())
            .unwrap_or_default(),
        full_name: form.full_name,
        phone: form.phone,
        default_address: addresses
            .iter()
            .find(|a| a.is_default)
            .map(brewline_core::profile::Address::one_line),
        address_count: addresses.len(),
        name_error: errors
            .and_then(|e| e.message_for("full_name"))
            .map(str::to_owned),
        phone_error: errors
            .and_then(|e| e.message_for("phone"))
            .map(str::to_owned),
    })
}

/// Display the profile page.
#[instrument(skip(state, customer, page), fields(user_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
) -> Result<AccountTemplate, AppError> {
    render(&state, &customer, page, None, None).await
}

/// Update name and phone.
#[instrument(skip(state, session, customer, page, form), fields(user_id = %customer.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let update = match ProfileUpdate::parse(&form.full_name, &form.phone) {
        Ok(update) => update,
        Err(errors) => {
            return Ok(render(&state, &customer, page, Some(form), Some(&errors))
                .await?
                .into_response());
        }
    };

    let profile = ProfileRepository::new(state.pool())
        .update(customer.id, &update)
        .await?;

    // keep the header greeting in sync
    let refreshed = CurrentCustomer {
        name: profile.display_name().to_owned(),
        ..customer
    };
    session
        .insert(session_keys::CURRENT_CUSTOMER, &refreshed)
        .await?;

    push_flash(&session, Flash::success("Profile updated")).await;
    Ok(Redirect::to("/account").into_response())
}
