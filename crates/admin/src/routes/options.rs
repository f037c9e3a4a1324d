//! Option group and option item route handlers (admin only).
//!
//! Groups and their items are managed on a single page; each form posts
//! back and redirects there with a flash.

use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::catalog::{OptionGroupDraft, OptionGroupWithItems, OptionItemDraft};
use brewline_core::messages::Flash;
use brewline_core::validation::ValidationError;
use brewline_core::{Money, OptionGroupId, OptionItemId};

use super::dashboard::AdminUserView;
use super::forms::{int_field, money_field};
use crate::db::OptionRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash, take_flash};
use crate::state::AppState;
use crate::views::render;

const OPTIONS_PATH: &str = "/options";

/// Form input for an option group.
#[derive(Debug, Default, Deserialize)]
pub struct GroupFormInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_required: Option<String>,
    #[serde(default)]
    pub max_select: String,
    #[serde(default)]
    pub sort_order: String,
}

impl GroupFormInput {
    fn parse(&self) -> Result<OptionGroupDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let draft = OptionGroupDraft {
            name: self.name.trim().to_owned(),
            is_required: self.is_required.is_some(),
            max_select: int_field(&mut errors, "max_select", &self.max_select, 1),
            sort_order: int_field(&mut errors, "sort_order", &self.sort_order, 0),
        };
        if let Err(invalid) = draft.validate() {
            errors.merge(invalid);
        }
        errors.finish().map(|()| draft)
    }
}

/// Form input for an option item. Items default to available.
#[derive(Debug, Default, Deserialize)]
pub struct ItemFormInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub extra_price: String,
    #[serde(default)]
    pub sort_order: String,
}

impl ItemFormInput {
    fn parse(&self) -> Result<OptionItemDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let extra_price = if self.extra_price.trim().is_empty() {
            Money::ZERO
        } else {
            money_field(&mut errors, "extra_price", &self.extra_price)
        };
        let draft = OptionItemDraft {
            name: self.name.trim().to_owned(),
            extra_price,
            is_available: true,
            sort_order: int_field(&mut errors, "sort_order", &self.sort_order, 0),
        };
        if let Err(invalid) = draft.validate() {
            errors.merge(invalid);
        }
        errors.finish().map(|()| draft)
    }
}

#[derive(Debug, Clone)]
pub struct OptionItemView {
    pub id: i32,
    pub name: String,
    pub extra_price: String,
    pub is_free: bool,
    pub is_available: bool,
}

#[derive(Debug, Clone)]
pub struct OptionGroupView {
    pub id: i32,
    pub name: String,
    pub is_required: bool,
    pub max_select: i32,
    pub sort_order: i32,
    pub selection_hint: String,
    pub items: Vec<OptionItemView>,
}

impl From<&OptionGroupWithItems> for OptionGroupView {
    fn from(entry: &OptionGroupWithItems) -> Self {
        let group = &entry.group;
        let selection_hint = match (group.is_required, entry.is_single_choice()) {
            (true, true) => "Pick exactly one".to_owned(),
            (false, true) => "Optional, one choice".to_owned(),
            (true, false) => format!("Pick 1 to {}", group.max_select),
            (false, false) => format!("Optional, up to {}", group.max_select),
        };
        Self {
            id: group.id.as_i32(),
            name: group.name.clone(),
            is_required: group.is_required,
            max_select: group.max_select,
            sort_order: group.sort_order,
            selection_hint,
            items: entry
                .items
                .iter()
                .map(|item| OptionItemView {
                    id: item.id.as_i32(),
                    name: item.name.clone(),
                    extra_price: item.extra_price.format(),
                    is_free: item.extra_price.is_zero(),
                    is_available: item.is_available,
                })
                .collect(),
        }
    }
}

/// Option groups page template.
#[derive(Template)]
#[template(path = "options/index.html")]
pub struct OptionsIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub groups: Vec<OptionGroupView>,
}

/// Flash the first validation message.
async fn flash_rejection(session: &Session, prefix: &str, errors: &ValidationError) {
    let message = errors
        .errors()
        .first()
        .map_or_else(|| prefix.to_owned(), |e| format!("{prefix}: {}", e.message));
    push_flash(session, Flash::error(message)).await;
}

/// Option groups page handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let groups = OptionRepository::new(state.pool())
        .groups_with_items()
        .await?;
    let template = OptionsIndexTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: OPTIONS_PATH.to_string(),
        flashes: take_flash(&session).await,
        groups: groups.iter().map(OptionGroupView::from).collect(),
    };
    Ok(render(&template))
}

/// Create option group handler.
#[instrument(skip(_staff, state, session, input))]
pub async fn create_group(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<GroupFormInput>,
) -> Result<Redirect, AppError> {
    match input.parse() {
        Ok(draft) => {
            let group = OptionRepository::new(state.pool())
                .create_group(&draft)
                .await?;
            push_flash(
                &session,
                Flash::success(format!("Option group {} created", group.name)),
            )
            .await;
        }
        Err(errors) => flash_rejection(&session, "Group not created", &errors).await,
    }
    Ok(Redirect::to(OPTIONS_PATH))
}

/// Update option group handler.
#[instrument(skip(_staff, state, session, input))]
pub async fn update_group(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(input): Form<GroupFormInput>,
) -> Result<Redirect, AppError> {
    match input.parse() {
        Ok(draft) => {
            let group = OptionRepository::new(state.pool())
                .update_group(OptionGroupId::new(id), &draft)
                .await?;
            push_flash(&session, Flash::success(format!("{} saved", group.name))).await;
        }
        Err(errors) => flash_rejection(&session, "Group not saved", &errors).await,
    }
    Ok(Redirect::to(OPTIONS_PATH))
}

/// Delete option group handler. Its items and product links go with it.
#[instrument(skip(_staff, state, session))]
pub async fn delete_group(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    OptionRepository::new(state.pool())
        .delete_group(OptionGroupId::new(id))
        .await?;
    push_flash(&session, Flash::success("Option group deleted")).await;
    Ok(Redirect::to(OPTIONS_PATH))
}

/// Add option item handler.
#[instrument(skip(_staff, state, session, input))]
pub async fn add_item(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(group_id): Path<i32>,
    Form(input): Form<ItemFormInput>,
) -> Result<Redirect, AppError> {
    match input.parse() {
        Ok(draft) => {
            let item = OptionRepository::new(state.pool())
                .add_item(OptionGroupId::new(group_id), &draft)
                .await?;
            push_flash(&session, Flash::success(format!("{} added", item.name))).await;
        }
        Err(errors) => flash_rejection(&session, "Option not added", &errors).await,
    }
    Ok(Redirect::to(OPTIONS_PATH))
}

/// Delete option item handler.
#[instrument(skip(_staff, state, session))]
pub async fn delete_item(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    OptionRepository::new(state.pool())
        .delete_item(OptionItemId::new(id))
        .await?;
    push_flash(&session, Flash::success("Option removed")).await;
    Ok(Redirect::to(OPTIONS_PATH))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brewline_core::catalog::{OptionGroup, OptionItem};

    use super::*;

    #[test]
    fn test_group_form_defaults() {
        let input = GroupFormInput {
            name: "Ice level".to_owned(),
            ..GroupFormInput::default()
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.max_select, 1);
        assert_eq!(draft.sort_order, 0);
        assert!(!draft.is_required);
    }

    #[test]
    fn test_group_requires_at_least_one_choice() {
        let input = GroupFormInput {
            name: "Toppings".to_owned(),
            max_select: "0".to_owned(),
            ..GroupFormInput::default()
        };
        let errors = input.parse().unwrap_err();
        assert_eq!(
            errors.message_for("max_select"),
            Some("Allow at least one choice")
        );
    }

    #[test]
    fn test_item_blank_price_is_free() {
        let input = ItemFormInput {
            name: "Less sugar".to_owned(),
            ..ItemFormInput::default()
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.extra_price, Money::ZERO);
        assert!(draft.is_available);

        let priced = ItemFormInput {
            name: "Extra shot".to_owned(),
            extra_price: "5000".to_owned(),
            ..ItemFormInput::default()
        };
        assert_eq!(priced.parse().unwrap().extra_price, Money::rupiah(5_000));
    }

    fn group(id: i32, name: &str, is_required: bool, max_select: i32) -> OptionGroupWithItems {
        OptionGroupWithItems {
            group: OptionGroup {
                id: OptionGroupId::new(id),
                name: name.to_owned(),
                is_required,
                max_select,
                sort_order: id,
            },
            items: vec![OptionItem {
                id: OptionItemId::new(id * 10),
                group_id: OptionGroupId::new(id),
                name: "Extra shot".to_owned(),
                extra_price: Money::rupiah(5_000),
                is_available: true,
                sort_order: 0,
            }],
        }
    }

    #[test]
    fn test_group_view_hints() {
        let groups = [
            group(1, "Sugar level", true, 1),
            group(2, "Toppings", false, 3),
            group(3, "Syrup", true, 2),
        ];
        let views: Vec<OptionGroupView> = groups.iter().map(OptionGroupView::from).collect();
        let hints: Vec<&str> = views.iter().map(|v| v.selection_hint.as_str()).collect();
        assert_eq!(hints, ["Pick exactly one", "Optional, up to 3", "Pick 1 to 2"]);
        assert!(views.iter().all(|v| v.items.iter().all(|i| !i.is_free)));
    }
}
