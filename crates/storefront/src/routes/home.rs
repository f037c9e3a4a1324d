//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use brewline_core::catalog::Category;
use brewline_core::promo::Promo;

use crate::db::{MenuRepository, SettingsRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;
use crate::views::ProductCard;

/// Featured items shown on the home page.
const FEATURED_LIMIT: usize = 8;

/// Promo banner display data.
#[derive(Clone)]
pub struct PromoView {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    /// Linked product page, if the banner points at one.
    pub href: Option<String>,
}

impl From<&Promo> for PromoView {
    fn from(promo: &Promo) -> Self {
        Self {
            title: promo.title.clone(),
            subtitle: promo.subtitle.clone(),
            image_url: promo.image_url.clone(),
            href: promo.product_id.map(|id| format!("/menu/{id}")),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub store_name: String,
    pub is_open: bool,
    pub promos: Vec<PromoView>,
    pub featured: Vec<ProductCard>,
    pub categories: Vec<Category>,
}

/// Display the home page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<HomeTemplate, AppError> {
    let menu = state.menu().get(state.pool()).await?;
    let promos = MenuRepository::new(state.pool())
        .live_promos(Utc::now())
        .await?;
    let settings = SettingsRepository::new(state.pool()).store().await?;

    let featured = menu
        .featured()
        .into_iter()
        .take(FEATURED_LIMIT)
        .map(|p| ProductCard::new(p, menu.needs_options(p.id)))
        .collect();

    Ok(HomeTemplate {
        page,
        store_name: settings.store_name,
        is_open: settings.is_open,
        promos: promos.iter().map(PromoView::from).collect(),
        featured,
        categories: menu.categories.clone(),
    })
}
