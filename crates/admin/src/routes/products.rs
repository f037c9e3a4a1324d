//! Product management route handlers (admin only).

use askama::Template;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use brewline_core::catalog::{Category, OptionGroup, Product, ProductDraft};
use brewline_core::messages::Flash;
use brewline_core::validation::ValidationError;
use brewline_core::{CategoryId, OptionGroupId, ProductId};
use brewline_platform::storage::MAX_IMAGE_BYTES;

use super::dashboard::AdminUserView;
use super::forms::{
    MultipartForm, discard_image, int_field, money_field, optional_id_field, optional_money_field,
    store_image,
};
use crate::db::products::ProductListing;
use crate::db::{CategoryRepository, ImageChange, OptionRepository, ProductRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::render;

/// Storage folder for product photos.
const IMAGE_FOLDER: &str = "products";

/// Stock at or below this is highlighted in the list.
const LOW_STOCK_THRESHOLD: i32 = 5;

// =============================================================================
// Form Types
// =============================================================================

/// Query parameters for the product list.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub q: Option<String>,
}

/// Form input for a stock adjustment (`+5`, `-2`).
#[derive(Debug, Deserialize)]
pub struct StockFormInput {
    pub delta: String,
}

/// Largest single stock adjustment accepted from the form.
const MAX_STOCK_DELTA: i32 = 10_000;

/// Parse a stock delta such as `+5` or `-2`, rejecting zero and anything
/// beyond [`MAX_STOCK_DELTA`] either way.
fn parse_stock_delta(raw: &str) -> Option<i32> {
    raw.trim()
        .trim_start_matches('+')
        .parse::<i32>()
        .ok()
        .filter(|d| *d != 0 && (-MAX_STOCK_DELTA..=MAX_STOCK_DELTA).contains(d))
}

// =============================================================================
// Views
// =============================================================================

/// Product row for the list page.
#[derive(Debug, Clone)]
pub struct ProductRowView {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub image_url: Option<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub stock: i32,
    pub is_low_stock: bool,
    pub is_available: bool,
    pub is_featured: bool,
}

impl From<&ProductListing> for ProductRowView {
    fn from(listing: &ProductListing) -> Self {
        let product = &listing.product;
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            category: listing
                .category_name
                .clone()
                .unwrap_or_else(|| "Uncategorized".to_owned()),
            image_url: product.image_url.clone(),
            price: product.effective_price().format(),
            original_price: product.has_discount().then(|| product.price.format()),
            stock: product.stock,
            is_low_stock: product.stock <= LOW_STOCK_THRESHOLD,
            is_available: product.is_available,
            is_featured: product.is_featured,
        }
    }
}

/// A checkbox or select entry.
#[derive(Debug, Clone)]
pub struct ChoiceView {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

/// Form values as typed, so a rejected form comes back filled in.
#[derive(Debug, Clone, Default)]
pub struct ProductFormView {
    pub name: String,
    pub description: String,
    pub price: String,
    pub discount_price: String,
    pub stock: String,
    pub category_id: Option<i32>,
    pub option_group_ids: Vec<i32>,
    pub is_available: bool,
    pub is_featured: bool,
    pub image_url: Option<String>,
}

impl ProductFormView {
    fn blank() -> Self {
        Self {
            stock: "0".to_owned(),
            is_available: true,
            ..Self::default()
        }
    }

    fn from_product(product: &Product, groups: &[OptionGroupId]) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.amount().to_string(),
            discount_price: product
                .discount_price
                .map(|d| d.amount().to_string())
                .unwrap_or_default(),
            stock: product.stock.to_string(),
            category_id: product.category_id.map(|c| c.as_i32()),
            option_group_ids: groups.iter().map(OptionGroupId::as_i32).collect(),
            is_available: product.is_available,
            is_featured: product.is_featured,
            image_url: product.image_url.clone(),
        }
    }

    fn from_form(form: &MultipartForm, image_url: Option<String>) -> Self {
        Self {
            name: form.text("name").to_owned(),
            description: form.text("description").to_owned(),
            price: form.text("price").to_owned(),
            discount_price: form.text("discount_price").to_owned(),
            stock: form.text("stock").to_owned(),
            category_id: form.text("category_id").trim().parse().ok(),
            option_group_ids: form
                .all("option_group_ids")
                .filter_map(|id| id.trim().parse().ok())
                .collect(),
            is_available: form.checked("is_available"),
            is_featured: form.checked("is_featured"),
            image_url,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Product list template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub products: Vec<ProductRowView>,
    pub search_query: String,
}

/// New/edit product form template.
#[derive(Template)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    /// `None` for a new product.
    pub product_id: Option<i32>,
    pub form: ProductFormView,
    pub categories: Vec<ChoiceView>,
    pub option_groups: Vec<ChoiceView>,
    pub errors: ValidationError,
    pub max_image_mb: usize,
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse the submitted fields into a draft, collecting every problem.
fn parse_draft(form: &MultipartForm) -> Result<ProductDraft, ValidationError> {
    let mut errors = ValidationError::default();
    let draft = ProductDraft {
        category_id: optional_id_field::<i32>(&mut errors, "category_id", form.text("category_id"))
            .map(CategoryId::new),
        name: form.text("name").trim().to_owned(),
        description: form.text("description").trim().to_owned(),
        price: money_field(&mut errors, "price", form.text("price")),
        discount_price: optional_money_field(
            &mut errors,
            "discount_price",
            form.text("discount_price"),
        ),
        stock: int_field(&mut errors, "stock", form.text("stock"), 0),
        is_available: form.checked("is_available"),
        is_featured: form.checked("is_featured"),
        option_group_ids: form
            .all("option_group_ids")
            .filter_map(|id| id.trim().parse().ok())
            .map(OptionGroupId::new)
            .collect(),
    };
    if let Err(invalid) = draft.validate() {
        errors.merge(invalid);
    }
    errors.finish().map(|()| draft)
}

fn category_choices(categories: &[Category], selected: Option<i32>) -> Vec<ChoiceView> {
    categories
        .iter()
        .map(|c| ChoiceView {
            id: c.id.as_i32(),
            name: c.name.clone(),
            selected: selected == Some(c.id.as_i32()),
        })
        .collect()
}

fn group_choices(groups: &[OptionGroup], selected: &[i32]) -> Vec<ChoiceView> {
    groups
        .iter()
        .map(|g| ChoiceView {
            id: g.id.as_i32(),
            name: g.name.clone(),
            selected: selected.contains(&g.id.as_i32()),
        })
        .collect()
}

/// Render the form with its select lists loaded.
async fn form_page(
    state: &AppState,
    staff: &CurrentStaff,
    flashes: Vec<Flash>,
    product_id: Option<i32>,
    form: ProductFormView,
    errors: ValidationError,
) -> Result<Html<String>, AppError> {
    let categories = CategoryRepository::new(state.pool()).all().await?;
    let groups = OptionRepository::new(state.pool()).groups().await?;
    let template = ProductFormTemplate {
        admin_user: AdminUserView::from(staff),
        current_path: "/products".to_string(),
        flashes,
        product_id,
        categories: category_choices(&categories, form.category_id),
        option_groups: group_choices(&groups, &form.option_group_ids),
        form,
        errors,
        max_image_mb: MAX_IMAGE_BYTES / (1024 * 1024),
    };
    Ok(render(&template))
}

async fn rejected(
    state: &AppState,
    staff: &CurrentStaff,
    product_id: Option<i32>,
    form: ProductFormView,
    errors: ValidationError,
) -> Result<Response, AppError> {
    let page = form_page(state, staff, Vec::new(), product_id, form, errors).await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

// =============================================================================
// Handlers
// =============================================================================

/// Product list handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ProductsQuery>,
) -> Result<Html<String>, AppError> {
    let products = ProductRepository::new(state.pool())
        .list(query.q.as_deref())
        .await?;

    let template = ProductsIndexTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/products".to_string(),
        flashes: take_flash(&session).await,
        products: products.iter().map(ProductRowView::from).collect(),
        search_query: query.q.unwrap_or_default(),
    };
    Ok(render(&template))
}

/// New product form handler.
#[instrument(skip(staff, state, session))]
pub async fn new(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let flashes = take_flash(&session).await;
    form_page(
        &state,
        &staff,
        flashes,
        None,
        ProductFormView::blank(),
        ValidationError::default(),
    )
    .await
}

/// Create product handler.
#[instrument(skip(staff, state, session, multipart))]
pub async fn create(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.take_image();
    let values = ProductFormView::from_form(&form, None);

    let mut draft = parse_draft(&form);
    let upload = match image {
        Some(Ok(upload)) => Some(upload),
        Some(Err(e)) => {
            let mut errors = draft.err().unwrap_or_default();
            errors.push("image", e.to_string());
            draft = Err(errors);
            None
        }
        None => None,
    };
    let draft = match draft {
        Ok(draft) => draft,
        Err(errors) => return rejected(&state, &staff, None, values, errors).await,
    };

    let image_url = match upload {
        Some(upload) => Some(store_image(&state, upload, IMAGE_FOLDER).await?),
        None => None,
    };
    let product = match ProductRepository::new(state.pool())
        .create(&draft, image_url.as_deref())
        .await
    {
        Ok(product) => product,
        Err(e) => {
            discard_image(&state, image_url.as_deref()).await;
            return Err(e.into());
        }
    };

    info!(product_id = %product.id, "Product created from back office");
    push_flash(&session, Flash::success(format!("{} was added", product.name))).await;
    Ok(Redirect::to("/products").into_response())
}

/// Edit product form handler.
#[instrument(skip(staff, state, session))]
pub async fn edit(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Html<String>, AppError> {
    let id = ProductId::new(id);
    let repo = ProductRepository::new(state.pool());
    let product = repo.get(id).await?;
    let groups = repo.option_group_ids(id).await?;

    let flashes = take_flash(&session).await;
    form_page(
        &state,
        &staff,
        flashes,
        Some(id.as_i32()),
        ProductFormView::from_product(&product, &groups),
        ValidationError::default(),
    )
    .await
}

/// Update product handler.
///
/// A new upload replaces the stored image; ticking `remove_image` drops
/// it. The old file is deleted from storage once the row is saved.
#[instrument(skip(staff, state, session, multipart))]
pub async fn update(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);
    let repo = ProductRepository::new(state.pool());
    let current = repo.get(id).await?;

    let mut form = MultipartForm::read(multipart).await?;
    let image = form.take_image();
    let values = ProductFormView::from_form(&form, current.image_url.clone());

    let mut draft = parse_draft(&form);
    let upload = match image {
        Some(Ok(upload)) => Some(upload),
        Some(Err(e)) => {
            let mut errors = draft.err().unwrap_or_default();
            errors.push("image", e.to_string());
            draft = Err(errors);
            None
        }
        None => None,
    };
    let draft = match draft {
        Ok(draft) => draft,
        Err(errors) => return rejected(&state, &staff, Some(id.as_i32()), values, errors).await,
    };

    let change = match upload {
        Some(upload) => ImageChange::Replace(store_image(&state, upload, IMAGE_FOLDER).await?),
        None if form.checked("remove_image") => ImageChange::Remove,
        None => ImageChange::Keep,
    };
    let (product, previous) = match repo.update(id, &draft, &change).await {
        Ok(saved) => saved,
        Err(e) => {
            if let ImageChange::Replace(url) = &change {
                discard_image(&state, Some(url)).await;
            }
            return Err(e.into());
        }
    };
    if change != ImageChange::Keep && previous != product.image_url {
        discard_image(&state, previous.as_deref()).await;
    }

    push_flash(&session, Flash::success(format!("{} was saved", product.name))).await;
    Ok(Redirect::to("/products").into_response())
}

/// Delete product handler. Also removes the product photo.
#[instrument(skip(_staff, state, session))]
pub async fn delete(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let image_url = ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;
    discard_image(&state, image_url.as_deref()).await;

    push_flash(&session, Flash::success("Product deleted")).await;
    Ok(Redirect::to("/products"))
}

/// Toggle availability handler.
#[instrument(skip(_staff, state, session))]
pub async fn toggle(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let product = ProductRepository::new(state.pool())
        .toggle_available(ProductId::new(id))
        .await?;
    let message = if product.is_available {
        format!("{} is now available", product.name)
    } else {
        format!("{} is now hidden from the menu", product.name)
    };
    push_flash(&session, Flash::success(message)).await;
    Ok(Redirect::to("/products"))
}

/// Adjust stock handler.
#[instrument(skip(_staff, state, session))]
pub async fn adjust_stock(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(input): Form<StockFormInput>,
) -> Result<Redirect, AppError> {
    let Some(delta) = parse_stock_delta(&input.delta) else {
        push_flash(
            &session,
            Flash::error(format!(
                "Enter a whole number between -{MAX_STOCK_DELTA} and {MAX_STOCK_DELTA}, such as 5 or -2"
            )),
        )
        .await;
        return Ok(Redirect::to("/products"));
    };

    match ProductRepository::new(state.pool())
        .adjust_stock(ProductId::new(id), delta)
        .await
    {
        Ok(stock) => push_flash(&session, Flash::success(format!("Stock is now {stock}"))).await,
        Err(e) => {
            let err = AppError::from(e);
            if err.status().is_server_error() {
                return Err(err);
            }
            push_flash(&session, Flash::error(err.user_message())).await;
        }
    }
    Ok(Redirect::to("/products"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brewline_core::Money;

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> MultipartForm {
        MultipartForm::from_pairs(pairs)
    }

    #[test]
    fn test_stock_delta_is_bounded() {
        assert_eq!(parse_stock_delta(" +5 "), Some(5));
        assert_eq!(parse_stock_delta("-2"), Some(-2));
        assert_eq!(parse_stock_delta("10000"), Some(10_000));
        assert_eq!(parse_stock_delta("-10000"), Some(-10_000));
        assert_eq!(parse_stock_delta("10001"), None);
        assert_eq!(parse_stock_delta("2147483647"), None);
        assert_eq!(parse_stock_delta("-2147483648"), None);
        assert_eq!(parse_stock_delta("0"), None);
        assert_eq!(parse_stock_delta("five"), None);
    }

    #[test]
    fn test_valid_form_becomes_draft() {
        let draft = parse_draft(&form(&[
            ("name", " Es Kopi Susu "),
            ("price", "25.000"),
            ("discount_price", "20000"),
            ("stock", "12"),
            ("category_id", "2"),
            ("option_group_ids", "1"),
            ("option_group_ids", "4"),
            ("is_available", "on"),
        ]))
        .unwrap();

        assert_eq!(draft.name, "Es Kopi Susu");
        assert_eq!(draft.price, Money::rupiah(25_000));
        assert_eq!(draft.discount_price, Some(Money::rupiah(20_000)));
        assert_eq!(draft.category_id, Some(CategoryId::new(2)));
        assert_eq!(
            draft.option_group_ids,
            [OptionGroupId::new(1), OptionGroupId::new(4)]
        );
        assert!(draft.is_available);
        assert!(!draft.is_featured);
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let errors = parse_draft(&form(&[
            ("name", "Croissant"),
            ("price", "18000"),
            ("discount_price", "18000"),
        ]))
        .unwrap_err();
        assert_eq!(
            errors.message_for("discount_price"),
            Some("Discount price must be lower than the original price")
        );
    }

    #[test]
    fn test_parse_and_rule_errors_are_reported_together() {
        let errors = parse_draft(&form(&[("name", ""), ("price", "abc"), ("stock", "-1")]))
            .unwrap_err();
        assert!(errors.message_for("name").is_some());
        assert!(errors.message_for("price").is_some());
        assert_eq!(errors.message_for("stock"), Some("Stock cannot be negative"));
    }

    #[test]
    fn test_group_choices_mark_selected() {
        let groups = vec![
            OptionGroup {
                id: OptionGroupId::new(1),
                name: "Sugar level".into(),
                is_required: true,
                max_select: 1,
                sort_order: 0,
            },
            OptionGroup {
                id: OptionGroupId::new(2),
                name: "Toppings".into(),
                is_required: false,
                max_select: 3,
                sort_order: 1,
            },
        ];
        let choices = group_choices(&groups, &[2]);
        let selected: Vec<bool> = choices.iter().map(|c| c.selected).collect();
        assert_eq!(selected, [false, true]);
    }
}
