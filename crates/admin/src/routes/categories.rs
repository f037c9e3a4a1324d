//! Menu category route handlers (admin only).

use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::CategoryId;
use brewline_core::catalog::{Category, CategoryDraft};
use brewline_core::messages::Flash;
use brewline_core::validation::ValidationError;

use super::dashboard::AdminUserView;
use super::forms::int_field;
use crate::db::{CategoryRepository, RepositoryError};
use crate::db::categories::CategoryListing;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::render;

/// Form input for a category.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryFormInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: String,
    #[serde(default)]
    pub is_active: Option<String>,
}

impl CategoryFormInput {
    fn parse(&self) -> Result<CategoryDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let draft = CategoryDraft {
            name: self.name.trim().to_owned(),
            sort_order: int_field(&mut errors, "sort_order", &self.sort_order, 0),
            is_active: self.is_active.is_some(),
        };
        if let Err(invalid) = draft.validate() {
            errors.merge(invalid);
        }
        errors.finish().map(|()| draft)
    }
}

/// Values shown in a category form.
#[derive(Debug, Clone)]
pub struct CategoryFormView {
    pub name: String,
    pub sort_order: String,
    pub is_active: bool,
}

impl CategoryFormView {
    fn blank() -> Self {
        Self {
            name: String::new(),
            sort_order: "0".to_owned(),
            is_active: true,
        }
    }
}

impl From<&Category> for CategoryFormView {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            sort_order: category.sort_order.to_string(),
            is_active: category.is_active,
        }
    }
}

impl From<&CategoryFormInput> for CategoryFormView {
    fn from(input: &CategoryFormInput) -> Self {
        Self {
            name: input.name.clone(),
            sort_order: input.sort_order.clone(),
            is_active: input.is_active.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRowView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub product_count: i64,
}

impl From<&CategoryListing> for CategoryRowView {
    fn from(listing: &CategoryListing) -> Self {
        Self {
            id: listing.category.id.as_i32(),
            name: listing.category.name.clone(),
            slug: listing.category.slug.clone(),
            sort_order: listing.category.sort_order,
            is_active: listing.category.is_active,
            product_count: listing.product_count,
        }
    }
}

/// Category list with the create form.
#[derive(Template)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub categories: Vec<CategoryRowView>,
    pub form: CategoryFormView,
    pub errors: ValidationError,
}

/// Edit category template.
#[derive(Template)]
#[template(path = "categories/edit.html")]
pub struct CategoryEditTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub id: i32,
    pub form: CategoryFormView,
    pub errors: ValidationError,
}

/// Unique-name conflicts are shown on the name field.
fn conflict_on_name(err: RepositoryError) -> Result<ValidationError, AppError> {
    match err {
        RepositoryError::Conflict(what) => Ok(ValidationError::field(
            "name",
            format!("There is already {what}"),
        )),
        other => Err(other.into()),
    }
}

async fn index_page(
    state: &AppState,
    staff: &CurrentStaff,
    flashes: Vec<Flash>,
    form: CategoryFormView,
    errors: ValidationError,
) -> Result<Html<String>, AppError> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    let template = CategoriesIndexTemplate {
        admin_user: AdminUserView::from(staff),
        current_path: "/categories".to_string(),
        flashes,
        categories: categories.iter().map(CategoryRowView::from).collect(),
        form,
        errors,
    };
    Ok(render(&template))
}

fn edit_page(
    staff: &CurrentStaff,
    id: CategoryId,
    form: CategoryFormView,
    errors: ValidationError,
) -> Response {
    let template = CategoryEditTemplate {
        admin_user: AdminUserView::from(staff),
        current_path: "/categories".to_string(),
        flashes: Vec::new(),
        id: id.as_i32(),
        form,
        errors,
    };
    (StatusCode::UNPROCESSABLE_ENTITY, render(&template)).into_response()
}

/// Category list handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let flashes = take_flash(&session).await;
    index_page(
        &state,
        &staff,
        flashes,
        CategoryFormView::blank(),
        ValidationError::default(),
    )
    .await
}

/// Create category handler.
#[instrument(skip(staff, state, session, input))]
pub async fn create(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<CategoryFormInput>,
) -> Result<Response, AppError> {
    let errors = match input.parse() {
        Ok(draft) => match CategoryRepository::new(state.pool()).create(&draft).await {
            Ok(category) => {
                push_flash(
                    &session,
                    Flash::success(format!("Category {} created", category.name)),
                )
                .await;
                return Ok(Redirect::to("/categories").into_response());
            }
            Err(e) => conflict_on_name(e)?,
        },
        Err(errors) => errors,
    };

    let page = index_page(
        &state,
        &staff,
        Vec::new(),
        CategoryFormView::from(&input),
        errors,
    )
    .await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

/// Edit category form handler.
#[instrument(skip(staff, state, session))]
pub async fn edit(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Html<String>, AppError> {
    let category = CategoryRepository::new(state.pool())
        .get(CategoryId::new(id))
        .await?;
    let template = CategoryEditTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/categories".to_string(),
        flashes: take_flash(&session).await,
        id,
        form: CategoryFormView::from(&category),
        errors: ValidationError::default(),
    };
    Ok(render(&template))
}

/// Update category handler.
#[instrument(skip(staff, state, session, input))]
pub async fn update(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(input): Form<CategoryFormInput>,
) -> Result<Response, AppError> {
    let id = CategoryId::new(id);
    let errors = match input.parse() {
        Ok(draft) => match CategoryRepository::new(state.pool()).update(id, &draft).await {
            Ok(category) => {
                push_flash(
                    &session,
                    Flash::success(format!("Category {} saved", category.name)),
                )
                .await;
                return Ok(Redirect::to("/categories").into_response());
            }
            Err(e) => conflict_on_name(e)?,
        },
        Err(errors) => errors,
    };
    Ok(edit_page(&staff, id, CategoryFormView::from(&input), errors))
}

/// Delete category handler. Its products become uncategorized.
#[instrument(skip(_staff, state, session))]
pub async fn delete(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await?;
    push_flash(&session, Flash::success("Category deleted")).await;
    Ok(Redirect::to("/categories"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_parses_to_draft() {
        let input = CategoryFormInput {
            name: " Non-Coffee ".to_owned(),
            sort_order: "3".to_owned(),
            is_active: Some("on".to_owned()),
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.name, "Non-Coffee");
        assert_eq!(draft.sort_order, 3);
        assert!(draft.is_active);
        assert_eq!(draft.slug(), "non-coffee");
    }

    #[test]
    fn test_unticked_checkbox_hides_category() {
        let input = CategoryFormInput {
            name: "Seasonal".to_owned(),
            ..CategoryFormInput::default()
        };
        assert!(!input.parse().unwrap().is_active);
    }

    #[test]
    fn test_name_conflict_becomes_field_error() {
        let errors =
            conflict_on_name(RepositoryError::Conflict("a category with this name".into()))
                .unwrap();
        assert_eq!(
            errors.message_for("name"),
            Some("There is already a category with this name")
        );
        assert!(conflict_on_name(RepositoryError::NotFound).is_err());
    }
}
