//! Promo banner route handlers (admin only).

use askama::Template;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{info, instrument};

use brewline_core::messages::Flash;
use brewline_core::promo::{Promo, PromoDraft};
use brewline_core::validation::ValidationError;
use brewline_core::{ProductId, PromoId};
use brewline_platform::storage::{ImageUpload, MAX_IMAGE_BYTES};

use super::dashboard::AdminUserView;
use super::forms::{MultipartForm, discard_image, int_field, optional_id_field, store_image};
use super::products::ChoiceView;
use crate::db::promos::PromoListing;
use crate::db::{ImageChange, ProductRepository, PromoRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::{format_datetime, parse_local_input, render, to_local_input};

/// Storage folder for banner images.
const IMAGE_FOLDER: &str = "promos";

/// Promo row for the list page.
#[derive(Debug, Clone)]
pub struct PromoRowView {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub product_name: Option<String>,
    pub schedule: String,
    pub is_active: bool,
    pub is_live: bool,
    pub sort_order: i32,
}

impl From<&PromoListing> for PromoRowView {
    fn from(listing: &PromoListing) -> Self {
        let promo = &listing.promo;
        Self {
            id: promo.id.as_i32(),
            title: promo.title.clone(),
            subtitle: promo.subtitle.clone(),
            image_url: promo.image_url.clone(),
            product_name: listing.product_name.clone(),
            schedule: schedule_label(promo),
            is_active: promo.is_active,
            is_live: promo.is_live(Utc::now()),
            sort_order: promo.sort_order,
        }
    }
}

fn schedule_label(promo: &Promo) -> String {
    match (promo.starts_at, promo.ends_at) {
        (None, None) => "Always".to_owned(),
        (Some(start), None) => format!("From {}", format_datetime(start)),
        (None, Some(end)) => format!("Until {}", format_datetime(end)),
        (Some(start), Some(end)) => {
            format!("{} to {}", format_datetime(start), format_datetime(end))
        }
    }
}

/// Form values as typed.
#[derive(Debug, Clone, Default)]
pub struct PromoFormView {
    pub title: String,
    pub subtitle: String,
    pub product_id: Option<i32>,
    pub is_active: bool,
    pub sort_order: String,
    pub starts_at: String,
    pub ends_at: String,
    pub image_url: Option<String>,
}

impl PromoFormView {
    fn blank() -> Self {
        Self {
            is_active: true,
            sort_order: "0".to_owned(),
            ..Self::default()
        }
    }

    fn from_promo(promo: &Promo) -> Self {
        Self {
            title: promo.title.clone(),
            subtitle: promo.subtitle.clone().unwrap_or_default(),
            product_id: promo.product_id.map(|p| p.as_i32()),
            is_active: promo.is_active,
            sort_order: promo.sort_order.to_string(),
            starts_at: promo.starts_at.map(to_local_input).unwrap_or_default(),
            ends_at: promo.ends_at.map(to_local_input).unwrap_or_default(),
            image_url: promo.image_url.clone(),
        }
    }

    fn from_form(form: &MultipartForm, image_url: Option<String>) -> Self {
        Self {
            title: form.text("title").to_owned(),
            subtitle: form.text("subtitle").to_owned(),
            product_id: form.text("product_id").trim().parse().ok(),
            is_active: form.checked("is_active"),
            sort_order: form.text("sort_order").to_owned(),
            starts_at: form.text("starts_at").to_owned(),
            ends_at: form.text("ends_at").to_owned(),
            image_url,
        }
    }
}

/// Promo list template.
#[derive(Template)]
#[template(path = "promos/index.html")]
pub struct PromosIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub promos: Vec<PromoRowView>,
}

/// New/edit promo form template.
#[derive(Template)]
#[template(path = "promos/form.html")]
pub struct PromoFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub promo_id: Option<i32>,
    pub form: PromoFormView,
    pub products: Vec<ChoiceView>,
    pub errors: ValidationError,
    pub max_image_mb: usize,
}

fn schedule_field(
    errors: &mut ValidationError,
    field: &'static str,
    raw: &str,
) -> Option<chrono::DateTime<Utc>> {
    parse_local_input(raw).unwrap_or_else(|_| {
        errors.push(field, "Pick a date and time");
        None
    })
}

fn parse_draft(form: &MultipartForm) -> Result<PromoDraft, ValidationError> {
    let mut errors = ValidationError::default();
    let subtitle = form.text("subtitle").trim();
    let draft = PromoDraft {
        title: form.text("title").trim().to_owned(),
        subtitle: (!subtitle.is_empty()).then(|| subtitle.to_owned()),
        product_id: optional_id_field::<i32>(&mut errors, "product_id", form.text("product_id"))
            .map(ProductId::new),
        is_active: form.checked("is_active"),
        sort_order: int_field(&mut errors, "sort_order", form.text("sort_order"), 0),
        starts_at: schedule_field(&mut errors, "starts_at", form.text("starts_at")),
        ends_at: schedule_field(&mut errors, "ends_at", form.text("ends_at")),
    };
    if let Err(invalid) = draft.validate() {
        errors.merge(invalid);
    }
    errors.finish().map(|()| draft)
}

async fn form_page(
    state: &AppState,
    staff: &CurrentStaff,
    flashes: Vec<Flash>,
    promo_id: Option<i32>,
    form: PromoFormView,
    errors: ValidationError,
) -> Result<Html<String>, AppError> {
    let products = ProductRepository::new(state.pool()).list(None).await?;
    let template = PromoFormTemplate {
        admin_user: AdminUserView::from(staff),
        current_path: "/promos".to_string(),
        flashes,
        promo_id,
        products: products
            .iter()
            .map(|listing| ChoiceView {
                id: listing.product.id.as_i32(),
                name: listing.product.name.clone(),
                selected: form.product_id == Some(listing.product.id.as_i32()),
            })
            .collect(),
        form,
        errors,
        max_image_mb: MAX_IMAGE_BYTES / (1024 * 1024),
    };
    Ok(render(&template))
}

async fn rejected(
    state: &AppState,
    staff: &CurrentStaff,
    promo_id: Option<i32>,
    form: PromoFormView,
    errors: ValidationError,
) -> Result<Response, AppError> {
    let page = form_page(state, staff, Vec::new(), promo_id, form, errors).await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

/// A read promo form: typed values, the parsed draft and an accepted upload.
struct Submission {
    form: MultipartForm,
    values: PromoFormView,
    draft: Result<PromoDraft, ValidationError>,
    upload: Option<ImageUpload>,
}

impl Submission {
    async fn read(multipart: Multipart, image_url: Option<String>) -> Result<Self, AppError> {
        let mut form = MultipartForm::read(multipart).await?;
        let image = form.take_image();
        let values = PromoFormView::from_form(&form, image_url);
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
        Ok(Self {
            form,
            values,
            draft,
            upload,
        })
    }
}

/// Promo list handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let promos = PromoRepository::new(state.pool()).list().await?;
    let template = PromosIndexTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/promos".to_string(),
        flashes: take_flash(&session).await,
        promos: promos.iter().map(PromoRowView::from).collect(),
    };
    Ok(render(&template))
}

/// New promo form handler.
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
        PromoFormView::blank(),
        ValidationError::default(),
    )
    .await
}

/// Create promo handler.
#[instrument(skip(staff, state, session, multipart))]
pub async fn create(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = Submission::read(multipart, None).await?;
    let draft = match submission.draft {
        Ok(draft) => draft,
        Err(errors) => return rejected(&state, &staff, None, submission.values, errors).await,
    };

    let image_url = match submission.upload {
        Some(upload) => Some(store_image(&state, upload, IMAGE_FOLDER).await?),
        None => None,
    };
    let promo = match PromoRepository::new(state.pool())
        .create(&draft, image_url.as_deref())
        .await
    {
        Ok(promo) => promo,
        Err(e) => {
            discard_image(&state, image_url.as_deref()).await;
            return Err(e.into());
        }
    };

    info!(promo_id = %promo.id, "Promo created from back office");
    push_flash(&session, Flash::success(format!("{} was added", promo.title))).await;
    Ok(Redirect::to("/promos").into_response())
}

/// Edit promo form handler.
#[instrument(skip(staff, state, session))]
pub async fn edit(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Html<String>, AppError> {
    let promo = PromoRepository::new(state.pool())
        .get(PromoId::new(id))
        .await?;
    let flashes = take_flash(&session).await;
    form_page(
        &state,
        &staff,
        flashes,
        Some(id),
        PromoFormView::from_promo(&promo),
        ValidationError::default(),
    )
    .await
}

/// Update promo handler. Image handling matches the product form.
#[instrument(skip(staff, state, session, multipart))]
pub async fn update(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let promo_id = PromoId::new(id);
    let repo = PromoRepository::new(state.pool());
    let current = repo.get(promo_id).await?;

    let submission = Submission::read(multipart, current.image_url.clone()).await?;
    let draft = match submission.draft {
        Ok(draft) => draft,
        Err(errors) => {
            return rejected(&state, &staff, Some(id), submission.values, errors).await;
        }
    };

    let change = match submission.upload {
        Some(upload) => ImageChange::Replace(store_image(&state, upload, IMAGE_FOLDER).await?),
        None if submission.form.checked("remove_image") => ImageChange::Remove,
        None => ImageChange::Keep,
    };
    let (promo, previous) = match repo.update(promo_id, &draft, &change).await {
        Ok(saved) => saved,
        Err(e) => {
            if let ImageChange::Replace(url) = &change {
                discard_image(&state, Some(url)).await;
            }
            return Err(e.into());
        }
    };
    if change != ImageChange::Keep && previous != promo.image_url {
        discard_image(&state, previous.as_deref()).await;
    }

    push_flash(&session, Flash::success(format!("{} was saved", promo.title))).await;
    Ok(Redirect::to("/promos").into_response())
}

/// Delete promo handler. Also removes the banner image.
#[instrument(skip(_staff, state, session))]
pub async fn delete(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let image_url = PromoRepository::new(state.pool())
        .delete(PromoId::new(id))
        .await?;
    discard_image(&state, image_url.as_deref()).await;
    push_flash(&session, Flash::success("Promo deleted")).await;
    Ok(Redirect::to("/promos"))
}

/// Toggle active handler.
#[instrument(skip(_staff, state, session))]
pub async fn toggle(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let promo = PromoRepository::new(state.pool())
        .toggle_active(PromoId::new(id))
        .await?;
    let message = if promo.is_active {
        format!("{} is now active", promo.title)
    } else {
        format!("{} is now paused", promo.title)
    };
    push_flash(&session, Flash::success(message)).await;
    Ok(Redirect::to("/promos"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> MultipartForm {
        MultipartForm::from_pairs(pairs)
    }

    #[test]
    fn test_draft_reads_schedule_in_shop_time() {
        let draft = parse_draft(&form(&[
            ("title", "Weekend Kopi Susu"),
            ("subtitle", "  "),
            ("product_id", "7"),
            ("is_active", "on"),
            ("starts_at", "2026-10-17T08:00"),
            ("ends_at", ""),
        ]))
        .unwrap();

        assert_eq!(draft.subtitle, None);
        assert_eq!(draft.product_id, Some(ProductId::new(7)));
        assert_eq!(
            draft.starts_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 17, 1, 0, 0).unwrap())
        );
        assert_eq!(draft.ends_at, None);
    }

    #[test]
    fn test_bad_dates_and_inverted_schedule_are_rejected() {
        let errors = parse_draft(&form(&[("title", "Promo"), ("starts_at", "tomorrow")]))
            .unwrap_err();
        assert_eq!(errors.message_for("starts_at"), Some("Pick a date and time"));

        let errors = parse_draft(&form(&[
            ("title", "Promo"),
            ("starts_at", "2026-10-18T08:00"),
            ("ends_at", "2026-10-17T08:00"),
        ]))
        .unwrap_err();
        assert_eq!(
            errors.message_for("ends_at"),
            Some("End must be after the start")
        );
    }

    #[test]
    fn test_schedule_label() {
        let promo = Promo {
            id: PromoId::new(1),
            title: "Pagi Deal".into(),
            subtitle: None,
            image_url: None,
            product_id: None,
            is_active: true,
            sort_order: 0,
            starts_at: None,
            ends_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(schedule_label(&promo), "Always");

        let start = Utc.with_ymd_and_hms(2026, 10, 17, 1, 0, 0).unwrap();
        let scheduled = Promo {
            starts_at: Some(start),
            ..promo
        };
        assert_eq!(schedule_label(&scheduled), "From 17 Oct 2026, 08:00");
    }
}
