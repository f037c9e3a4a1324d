//! Store settings route handlers (admin only).
//!
//! One form for the store-wide switches plus a read-only panel showing
//! the WhatsApp gateway; pairing itself goes through `/api/whatsapp`.

use askama::Template;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use brewline_core::messages::Flash;
use brewline_core::settings::StoreSettings;
use brewline_core::validation::{ValidationError, char_len};
use brewline_core::PhoneNumber;
use brewline_platform::whatsapp::MonitorSnapshot;

use super::dashboard::AdminUserView;
use super::forms::money_field;
use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::{format_datetime, render};

const MAX_STORE_NAME: usize = 80;

/// Settings form input. Checkboxes are absent when unticked.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsFormInput {
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub is_open: Option<String>,
    #[serde(default)]
    pub delivery_enabled: Option<String>,
    #[serde(default)]
    pub delivery_fee: String,
    #[serde(default)]
    pub whatsapp_notifications: Option<String>,
    #[serde(default)]
    pub admin_whatsapp: String,
}

impl SettingsFormInput {
    fn parse(&self) -> Result<StoreSettings, ValidationError> {
        let mut errors = ValidationError::default();
        let store_name = self.store_name.trim().to_owned();
        let len = char_len(&store_name);
        errors.check(len > 0, "store_name", "Store name is required");
        errors.check(
            len <= MAX_STORE_NAME,
            "store_name",
            format!("Store name must be at most {MAX_STORE_NAME} characters"),
        );

        let admin_whatsapp = match self.admin_whatsapp.trim() {
            "" => None,
            raw => PhoneNumber::parse(raw)
                .map_err(|e| errors.push("admin_whatsapp", e.to_string()))
                .ok(),
        };

        let settings = StoreSettings {
            store_name,
            is_open: self.is_open.is_some(),
            delivery_enabled: self.delivery_enabled.is_some(),
            delivery_fee: money_field(&mut errors, "delivery_fee", &self.delivery_fee),
            whatsapp_notifications: self.whatsapp_notifications.is_some(),
            admin_whatsapp,
        };
        errors.finish().map(|()| settings)
    }
}

/// Values shown in the settings form.
#[derive(Debug, Clone)]
pub struct SettingsFormView {
    pub store_name: String,
    pub is_open: bool,
    pub delivery_enabled: bool,
    pub delivery_fee: String,
    pub whatsapp_notifications: bool,
    pub admin_whatsapp: String,
}

impl From<&StoreSettings> for SettingsFormView {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            store_name: settings.store_name.clone(),
            is_open: settings.is_open,
            delivery_enabled: settings.delivery_enabled,
            delivery_fee: settings.delivery_fee.amount().to_string(),
            whatsapp_notifications: settings.whatsapp_notifications,
            admin_whatsapp: settings
                .admin_whatsapp
                .as_ref()
                .map(PhoneNumber::display)
                .unwrap_or_default(),
        }
    }
}

impl From<&SettingsFormInput> for SettingsFormView {
    fn from(input: &SettingsFormInput) -> Self {
        Self {
            store_name: input.store_name.clone(),
            is_open: input.is_open.is_some(),
            delivery_enabled: input.delivery_enabled.is_some(),
            delivery_fee: input.delivery_fee.clone(),
            whatsapp_notifications: input.whatsapp_notifications.is_some(),
            admin_whatsapp: input.admin_whatsapp.clone(),
        }
    }
}

/// Gateway panel contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppPanel {
    pub configured: bool,
    pub connected: bool,
    pub phone: Option<String>,
    pub state: String,
    pub error: Option<String>,
    pub checked_at: Option<String>,
}

impl WhatsAppPanel {
    const fn not_configured() -> Self {
        Self {
            configured: false,
            connected: false,
            phone: None,
            state: String::new(),
            error: None,
            checked_at: None,
        }
    }

    fn from_snapshot(snapshot: &MonitorSnapshot) -> Self {
        Self {
            configured: true,
            connected: snapshot.is_connected(),
            phone: snapshot.status.phone.clone(),
            state: snapshot
                .status
                .state
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            error: snapshot.error.clone(),
            checked_at: snapshot.checked_at.map(format_datetime),
        }
    }
}

/// Settings page template.
#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub form: SettingsFormView,
    pub errors: ValidationError,
    pub whatsapp: WhatsAppPanel,
}

fn whatsapp_panel(state: &AppState) -> WhatsAppPanel {
    state
        .whatsapp_monitor()
        .map_or_else(WhatsAppPanel::not_configured, |monitor| {
            WhatsAppPanel::from_snapshot(&monitor.latest())
        })
}

fn settings_page(
    state: &AppState,
    staff: &CurrentStaff,
    flashes: Vec<Flash>,
    form: SettingsFormView,
    errors: ValidationError,
) -> Html<String> {
    let template = SettingsTemplate {
        admin_user: AdminUserView::from(staff),
        current_path: "/settings".to_string(),
        flashes,
        form,
        errors,
        whatsapp: whatsapp_panel(state),
    };
    render(&template)
}

/// Settings page handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let settings = SettingsRepository::new(state.pool()).store().await?;
    let flashes = take_flash(&session).await;
    Ok(settings_page(
        &state,
        &staff,
        flashes,
        SettingsFormView::from(&settings),
        ValidationError::default(),
    ))
}

/// Save settings handler.
#[instrument(skip(staff, state, session, input), fields(staff_id = %staff.id))]
pub async fn update(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<SettingsFormInput>,
) -> Result<Response, AppError> {
    let settings = match input.parse() {
        Ok(settings) => settings,
        Err(errors) => {
            let page = settings_page(
                &state,
                &staff,
                Vec::new(),
                SettingsFormView::from(&input),
                errors,
            );
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    SettingsRepository::new(state.pool())
        .save_store(&settings)
        .await?;
    info!(
        is_open = settings.is_open,
        delivery_enabled = settings.delivery_enabled,
        "Store settings updated"
    );

    push_flash(&session, Flash::success("Settings saved")).await;
    Ok(Redirect::to("/settings").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use brewline_core::Money;
    use brewline_platform::whatsapp::GatewayStatus;

    use super::*;

    fn input() -> SettingsFormInput {
        SettingsFormInput {
            store_name: " Brewline Senopati ".to_owned(),
            is_open: Some("on".to_owned()),
            delivery_enabled: None,
            delivery_fee: "12.000".to_owned(),
            whatsapp_notifications: Some("on".to_owned()),
            admin_whatsapp: "0812-1111-2222".to_owned(),
        }
    }

    #[test]
    fn test_form_parses_into_settings() {
        let settings = input().parse().unwrap();
        assert_eq!(settings.store_name, "Brewline Senopati");
        assert!(settings.is_open);
        assert!(!settings.delivery_enabled);
        assert_eq!(settings.delivery_fee, Money::rupiah(12_000));
        assert!(settings.whatsapp_notifications);
        assert_eq!(
            settings.admin_whatsapp.unwrap().as_str(),
            "6281211112222"
        );
    }

    #[test]
    fn test_blank_admin_phone_is_allowed() {
        let form = SettingsFormInput {
            admin_whatsapp: "  ".to_owned(),
            ..input()
        };
        assert_eq!(form.parse().unwrap().admin_whatsapp, None);
    }

    #[test]
    fn test_invalid_fields_are_collected() {
        let form = SettingsFormInput {
            store_name: String::new(),
            delivery_fee: "free".to_owned(),
            admin_whatsapp: "12ab".to_owned(),
            ..input()
        };
        let errors = form.parse().unwrap_err();
        assert!(errors.message_for("store_name").is_some());
        assert!(errors.message_for("delivery_fee").is_some());
        assert!(errors.message_for("admin_whatsapp").is_some());
    }

    #[test]
    fn test_whatsapp_panel_from_snapshot() {
        let snapshot = MonitorSnapshot {
            status: GatewayStatus {
                connected: true,
                phone: Some("6281299990000".to_owned()),
                state: Some("open".to_owned()),
            },
            error: None,
            checked_at: Some(Utc::now()),
        };
        let panel = WhatsAppPanel::from_snapshot(&snapshot);
        assert!(panel.configured);
        assert!(panel.connected);
        assert_eq!(panel.state, "open");
        assert!(panel.checked_at.is_some());

        let failing = MonitorSnapshot {
            error: Some("gateway timeout".to_owned()),
            ..snapshot
        };
        assert!(!WhatsAppPanel::from_snapshot(&failing).connected);
        assert!(!WhatsAppPanel::not_configured().configured);
    }
}
