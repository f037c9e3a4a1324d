//! Menu route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use brewline_core::ProductId;
use brewline_core::catalog::{Category, OptionGroupWithItems, Product};

use crate::db::MenuRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;
use crate::views::ProductCard;

/// Menu filter parameters.
#[derive(Debug, Default, Deserialize)]
pub struct MenuQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Free-text search over name and description.
    pub q: Option<String>,
}

/// Menu grid template.
#[derive(Template, WebTemplate)]
#[template(path = "menu/index.html")]
pub struct MenuIndexTemplate {
    pub page: PageContext,
    pub categories: Vec<Category>,
    pub active_category: Option<String>,
    pub query: String,
    pub products: Vec<ProductCard>,
}

/// Display the menu, optionally filtered.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<MenuQuery>,
) -> Result<MenuIndexTemplate, AppError> {
    let menu = state.menu().get(state.pool()).await?;
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let products = menu
        .filter(category, query.q.as_deref())
        .into_iter()
        .map(|p| ProductCard::new(p, menu.needs_options(p.id)))
        .collect();

    Ok(MenuIndexTemplate {
        page,
        categories: menu.categories.clone(),
        active_category: category.map(str::to_owned),
        query: query.q.unwrap_or_default(),
        products,
    })
}

/// One pickable option.
#[derive(Clone)]
pub struct OptionItemView {
    pub id: i32,
    pub name: String,
    /// `+ Rp 5.000`, absent for free options.
    pub extra: Option<String>,
    pub available: bool,
}

/// Option group with its items, rendered as radios or checkboxes.
#[derive(Clone)]
pub struct OptionGroupView {
    pub id: i32,
    pub name: String,
    pub required: bool,
    pub single_choice: bool,
    pub max_select: i32,
    pub items: Vec<OptionItemView>,
}

impl From<&OptionGroupWithItems> for OptionGroupView {
    fn from(entry: &OptionGroupWithItems) -> Self {
        Self {
            id: entry.group.id.as_i32(),
            name: entry.group.name.clone(),
            required: entry.group.is_required,
            single_choice: entry.is_single_choice(),
            max_select: entry.group.max_select,
            items: entry
                .items
                .iter()
                .map(|item| OptionItemView {
                    id: item.id.as_i32(),
                    name: item.name.clone(),
                    extra: (!item.extra_price.is_zero())
                        .then(|| format!("+ {}", item.extra_price.format())),
                    available: item.is_available,
                })
                .collect(),
        }
    }
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "menu/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductCard,
    pub orderable: bool,
    pub max_quantity: u32,
    pub option_groups: Vec<OptionGroupView>,
}

/// Display a product with its option groups.
///
/// Products that dropped off the menu (sold out or switched off) still
/// render so shared links work, but without the add-to-cart form.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i32>,
) -> Result<ProductShowTemplate, AppError> {
    let id = ProductId::new(id);
    let menu = state.menu().get(state.pool()).await?;

    let (product, groups): (Product, Vec<OptionGroupWithItems>) =
        if let Some(product) = menu.products.iter().find(|p| p.id == id) {
            let groups = menu.option_groups.get(&id).cloned().unwrap_or_default();
            (product.clone(), groups)
        } else {
            let repo = MenuRepository::new(state.pool());
            let product = repo
                .get_product(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
            let groups = repo.option_groups_for_product(id).await?;
            (product, groups)
        };

    let needs_options = groups.iter().any(|g| g.group.is_required);
    let max_quantity = u32::try_from(product.stock)
        .unwrap_or(0)
        .min(brewline_core::cart::Cart::MAX_LINE_QUANTITY);

    Ok(ProductShowTemplate {
        page,
        orderable: product.is_orderable(),
        max_quantity,
        product: ProductCard::new(&product, needs_options),
        option_groups: groups.iter().map(OptionGroupView::from).collect(),
    })
}
