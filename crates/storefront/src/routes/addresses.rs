//! Delivery address book.
//!
//! Every customer has at most one default address; the repository keeps
//! that true across create, update, delete and "make default".

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::AddressId;
use brewline_core::messages::Flash;
use brewline_core::profile::{Address, AddressDraft, AddressInput};
use brewline_core::validation::ValidationError;

use crate::db::{AddressRepository, RepositoryError};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::state::AppState;

/// Address display data for templates.
#[derive(Clone)]
pub struct AddressView {
    pub id: i32,
    pub label: String,
    pub recipient_name: String,
    pub phone: String,
    pub line: String,
    pub is_default: bool,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        Self {
            id: address.id.as_i32(),
            label: address.label.clone(),
            recipient_name: address.recipient_name.clone(),
            phone: address.phone.clone(),
            line: address.one_line(),
            is_default: address.is_default,
        }
    }
}

/// Address list template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub page: PageContext,
    pub addresses: Vec<AddressView>,
}

/// New/edit address form template.
#[derive(Template, WebTemplate)]
#[template(path = "account/address_form.html")]
pub struct AddressFormTemplate {
    pub page: PageContext,
    pub title: &'static str,
    pub action: String,
    pub input: AddressInput,
    pub errors: ValidationError,
}

impl AddressFormTemplate {
    fn new_address(page: PageContext, input: AddressInput, errors: ValidationError) -> Self {
        Self {
            page,
            title: "New address",
            action: "/account/addresses".to_owned(),
            input,
            errors,
        }
    }

    fn edit_address(
        page: PageContext,
        id: AddressId,
        input: AddressInput,
        errors: ValidationError,
    ) -> Self {
        Self {
            page,
            title: "Edit address",
            action: format!("/account/addresses/{id}"),
            input,
            errors,
        }
    }
}

fn input_from(address: &Address) -> AddressInput {
    AddressInput {
        label: address.label.clone(),
        recipient_name: address.recipient_name.clone(),
        phone: address.phone.clone(),
        street: address.street.clone(),
        city: address.city.clone(),
        postal_code: address.postal_code.clone().unwrap_or_default(),
        notes: address.notes.clone().unwrap_or_default(),
        is_default: address.is_default.then(|| "on".to_owned()),
    }
}

fn parse_id(raw: &str) -> Result<AddressId, AppError> {
    raw.parse::<AddressId>()
        .map_err(|_| AppError::NotFound(format!("address {raw}")))
}

/// Display the address list, default first.
#[instrument(skip(state, customer, page), fields(user_id = %customer.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
) -> Result<AddressesTemplate, AppError> {
    let addresses = AddressRepository::new(state.pool())
        .list(customer.id)
        .await?;
    Ok(AddressesTemplate {
        page,
        addresses: addresses.iter().map(AddressView::from).collect(),
    })
}

#[instrument(skip_all)]
pub async fn new(RequireAuth(_customer): RequireAuth, page: PageContext) -> AddressFormTemplate {
    AddressFormTemplate::new_address(page, AddressInput::default(), ValidationError::default())
}

#[instrument(skip(state, session, customer, page, input), fields(user_id = %customer.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Form(input): Form<AddressInput>,
) -> Result<Response, AppError> {
    let draft = match AddressDraft::parse(&input) {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(AddressFormTemplate::new_address(page, input, errors).into_response());
        }
    };

    AddressRepository::new(state.pool())
        .create(customer.id, &draft)
        .await?;
    push_flash(&session, Flash::success("Address saved")).await;
    Ok(Redirect::to("/account/addresses").into_response())
}

#[instrument(skip(state, customer, page), fields(user_id = %customer.id))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<AddressFormTemplate, AppError> {
    let id = parse_id(&id)?;
    let address = AddressRepository::new(state.pool())
        .get(customer.id, id)
        .await?
        .ok_or(AppError::Database(RepositoryError::NotFound))?;
    Ok(AddressFormTemplate::edit_address(
        page,
        id,
        input_from(&address),
        ValidationError::default(),
    ))
}

#[instrument(skip(state, session, customer, page, input), fields(user_id = %customer.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    page: PageContext,
    Path(id): Path<String>,
    Form(input): Form<AddressInput>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let draft = match AddressDraft::parse(&input) {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(AddressFormTemplate::edit_address(page, id, input, errors).into_response());
        }
    };

    AddressRepository::new(state.pool())
        .update(customer.id, id, &draft)
        .await?;
    push_flash(&session, Flash::success("Address updated")).await;
    Ok(Redirect::to("/account/addresses").into_response())
}

/// Delete an address. If it was the default, the newest remaining address
/// takes over.
#[instrument(skip(state, session, customer), fields(user_id = %customer.id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    AddressRepository::new(state.pool())
        .delete(customer.id, id)
        .await?;
    push_flash(&session, Flash::success("Address removed")).await;
    Ok(Redirect::to("/account/addresses"))
}

#[instrument(skip(state, session, customer), fields(user_id = %customer.id))]
pub async fn make_default(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    AddressRepository::new(state.pool())
        .set_default(customer.id, id)
        .await?;
    push_flash(&session, Flash::success("Default address updated")).await;
    Ok(Redirect::to("/account/addresses"))
}
