//! Cart route handlers.
//!
//! The cart lives in the session as product/option references; every view
//! prices it again against the live menu. HTMX requests get fragments and a
//! `cart-updated` trigger, plain form posts get a redirect with a toast.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::cart::{Cart, CartLine};
use brewline_core::catalog::validate_selection;
use brewline_core::messages::Flash;
use brewline_core::{OptionItemId, ProductId};

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{PageContext, push_flash};
use crate::services::cart::{PricedCart, load_cart, price_cart, save_cart};
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub key: String,
    pub product_id: ProductId,
    pub name: String,
    pub options: String,
    pub note: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub max_quantity: u32,
    pub line_total: String,
}

/// Cart display data for templates.
#[derive(Clone, Default)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    /// Products dropped since the last view.
    pub removed: Vec<String>,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&PricedCart> for CartView {
    fn from(priced: &PricedCart) -> Self {
        let lines: Vec<CartLineView> = priced
            .entries
            .iter()
            .map(|entry| CartLineView {
                key: entry.key.clone(),
                product_id: entry.line.product_id,
                name: entry.line.product_name.clone(),
                options: entry
                    .line
                    .options
                    .iter()
                    .map(|o| o.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                note: entry.line.note.clone(),
                image_url: entry.image_url.clone(),
                unit_price: entry.line.unit_price.format(),
                quantity: entry.line.quantity,
                max_quantity: u32::try_from(entry.stock)
                    .unwrap_or(0)
                    .clamp(1, Cart::MAX_LINE_QUANTITY),
                line_total: entry.line.line_total.format(),
            })
            .collect();

        Self {
            item_count: lines.iter().map(|l| l.quantity).sum(),
            lines,
            subtotal: priced.subtotal().format(),
            removed: priced.removed.clone(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub is_open: bool,
}

/// Cart items fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Inline error next to the add-to-cart button (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/form_error.html")]
pub struct FormErrorTemplate {
    pub message: String,
}

/// Cart count badge fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Form Types
// =============================================================================

/// Quantity change for one line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub key: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub key: String,
}

/// Parsed add-to-cart form.
///
/// Option checkboxes repeat the `option` field, so the raw form is read as
/// pairs rather than a struct.
#[derive(Debug, PartialEq, Eq)]
struct AddToCart {
    product_id: ProductId,
    options: Vec<OptionItemId>,
    quantity: u32,
    note: Option<String>,
}

impl AddToCart {
    fn parse(fields: &[(String, String)]) -> Result<Self, String> {
        let mut product_id = None;
        let mut options = Vec::new();
        let mut quantity = 1;
        let mut note = None;

        for (name, value) in fields {
            match name.as_str() {
                "product_id" => {
                    product_id = Some(
                        value
                            .parse::<ProductId>()
                            .map_err(|_| "Unknown menu item".to_owned())?,
                    );
                }
                // radios for single-choice groups arrive as option_<group>
                n if n == "option" || n.starts_with("option_") => {
                    if value.is_empty() {
                        continue;
                    }
                    options.push(
                        value
                            .parse::<OptionItemId>()
                            .map_err(|_| "Unknown option".to_owned())?,
                    );
                }
                "quantity" => {
                    quantity = value
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| "Quantity must be a number".to_owned())?;
                }
                "note" => note = Some(value.clone()),
                _ => {}
            }
        }

        let product_id = product_id.ok_or_else(|| "Unknown menu item".to_owned())?;
        if quantity == 0 {
            return Err("Quantity must be at least 1".to_owned());
        }
        Ok(Self {
            product_id,
            options,
            quantity,
            note,
        })
    }
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Re-price the session cart, saving it if stale lines were dropped.
async fn priced_view(state: &AppState, session: &Session) -> Result<CartView, AppError> {
    let mut cart = load_cart(session).await;
    let priced = price_cart(state.pool(), &mut cart).await?;
    if !priced.removed.is_empty() {
        save_cart(session, &cart).await?;
    }
    Ok(CartView::from(&priced))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
) -> Result<CartShowTemplate, AppError> {
    let cart = priced_view(&state, &session).await?;
    let settings = SettingsRepository::new(state.pool()).store().await?;
    Ok(CartShowTemplate {
        page,
        cart,
        is_open: settings.is_open,
    })
}

/// Add a configured line to the cart.
///
/// The option selection is checked against the product's current groups
/// before anything is stored.
#[instrument(skip(state, session, headers, fields))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let htmx = is_htmx(&headers);
    let request = match AddToCart::parse(&fields) {
        Ok(request) => request,
        Err(message) => return add_failed(&session, htmx, None, message).await,
    };
    let product_id = request.product_id;

    let menu = match state.menu().get(state.pool()).await {
        Ok(menu) => menu,
        Err(e) => return AppError::from(e).into_response(),
    };
    let Some(product) = menu.products.iter().find(|p| p.id == product_id) else {
        return add_failed(
            &session,
            htmx,
            Some(product_id),
            "Sorry, that item is not available right now".to_owned(),
        )
        .await;
    };
    let groups = menu.option_groups.get(&product_id).map_or(&[][..], Vec::as_slice);
    if let Err(e) = validate_selection(groups, &request.options) {
        return add_failed(&session, htmx, Some(product_id), capitalize(&e.to_string())).await;
    }

    let mut cart = load_cart(&session).await;
    cart.add(CartLine::new(
        product_id,
        request.options,
        request.quantity,
        request.note,
    ));
    if let Err(e) = save_cart(&session, &cart).await {
        return AppError::from(e).into_response();
    }
    tracing::debug!(product_id = %product_id, items = cart.item_count(), "Added to cart");

    if htmx {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response()
    } else {
        push_flash(&session, Flash::success(format!("{} added to your cart", product.name))).await;
        Redirect::to("/cart").into_response()
    }
}

async fn add_failed(
    session: &Session,
    htmx: bool,
    product_id: Option<ProductId>,
    message: String,
) -> Response {
    if htmx {
        // The add form targets the header badge; errors go next to the form.
        let target = product_id.map_or_else(
            || "#add-error".to_owned(),
            |id| format!("#add-error-{id}"),
        );
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            AppendHeaders([("HX-Retarget", target)]),
            FormErrorTemplate { message },
        )
            .into_response();
    }
    push_flash(session, Flash::error(message)).await;
    let back = product_id.map_or_else(|| "/menu".to_owned(), |id| format!("/menu/{id}"));
    Redirect::to(&back).into_response()
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Update a line's quantity. Zero removes the line.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response, AppError> {
    let mut cart = load_cart(&session).await;
    if form.quantity == 0 {
        cart.remove(&form.key);
    } else {
        cart.set_quantity(&form.key, form.quantity);
    }
    save_cart(&session, &cart).await?;
    cart_changed(&state, &session, &headers).await
}

/// Remove a line from the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response, AppError> {
    let mut cart = load_cart(&session).await;
    cart.remove(&form.key);
    save_cart(&session, &cart).await?;
    cart_changed(&state, &session, &headers).await
}

async fn cart_changed(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    if !is_htmx(headers) {
        return Ok(Redirect::to("/cart").into_response());
    }
    let cart = priced_view(state, session).await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { cart },
    )
        .into_response())
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> CartCountTemplate {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(fields: &[(&str, &str)]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_add_form_collects_repeated_options() {
        let parsed = AddToCart::parse(&pairs(&[
            ("product_id", "4"),
            ("option_1", "10"),
            ("option", "21"),
            ("option", "22"),
            ("quantity", "2"),
            ("note", "extra hot"),
        ]))
        .unwrap();

        assert_eq!(parsed.product_id, ProductId::new(4));
        assert_eq!(
            parsed.options,
            [OptionItemId::new(10), OptionItemId::new(21), OptionItemId::new(22)]
        );
        assert_eq!(parsed.quantity, 2);
        assert_eq!(parsed.note.as_deref(), Some("extra hot"));
    }

    #[test]
    fn test_add_form_defaults_and_rejections() {
        let parsed = AddToCart::parse(&pairs(&[("product_id", "4"), ("option_2", "")])).unwrap();
        assert_eq!(parsed.quantity, 1);
        assert!(parsed.options.is_empty());

        assert!(AddToCart::parse(&pairs(&[("quantity", "1")])).is_err());
        assert!(AddToCart::parse(&pairs(&[("product_id", "4"), ("quantity", "0")])).is_err());
        assert!(AddToCart::parse(&pairs(&[("product_id", "x")])).is_err());
    }

    #[test]
    fn test_capitalize_selection_errors() {
        assert_eq!(capitalize("please choose a Sugar"), "Please choose a Sugar");
        assert_eq!(capitalize(""), "");
    }
}
