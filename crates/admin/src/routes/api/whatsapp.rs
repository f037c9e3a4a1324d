//! WhatsApp gateway API routes.
//!
//! JSON endpoints behind the settings page's WhatsApp panel. Status is
//! served from the process-wide monitor instead of hitting the gateway
//! once per open tab.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, instrument};

use brewline_platform::whatsapp::{MonitorSnapshot, WhatsAppClient};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Error response for API endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: String,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "WhatsApp API request failed");
        }
        Self {
            status,
            error: err.user_message(),
        }
    }
}

impl From<brewline_platform::whatsapp::WhatsAppError> for ApiError {
    fn from(err: brewline_platform::whatsapp::WhatsAppError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Build the WhatsApp API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/whatsapp/status", get(status))
        .route("/api/whatsapp/qr", get(qr))
        .route("/api/whatsapp/login", post(login))
        .route("/api/whatsapp/logout", post(logout))
}

/// Latest monitor poll.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub connected: bool,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub checked_at: Option<String>,
}

impl From<MonitorSnapshot> for StatusResponse {
    fn from(snapshot: MonitorSnapshot) -> Self {
        Self {
            connected: snapshot.is_connected(),
            phone: snapshot.status.phone,
            state: snapshot.status.state,
            error: snapshot.error,
            checked_at: snapshot.checked_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QrResponse {
    /// `data:image/png;base64,...`
    pub qr: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
}

fn not_configured() -> ApiError {
    AppError::Unavailable("WhatsApp gateway is not configured".to_owned()).into()
}

fn gateway(state: &AppState) -> Result<&WhatsAppClient, ApiError> {
    state.whatsapp().ok_or_else(not_configured)
}

/// Connection status from the last poll.
///
/// # Errors
///
/// Returns 503 when no gateway is configured.
pub async fn status(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let monitor = state.whatsapp_monitor().ok_or_else(not_configured)?;
    Ok(Json(monitor.latest().into()))
}

/// Pairing QR code.
///
/// # Errors
///
/// Returns 409 when the session is already paired, 502 when the gateway
/// fails.
#[instrument(skip(_staff, state))]
pub async fn qr(
    RequireAdmin(_staff): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<QrResponse>, ApiError> {
    let code = gateway(&state)?.qr().await?;
    Ok(Json(QrResponse { qr: code.qr }))
}

/// Start a pairing session.
///
/// # Errors
///
/// Returns 502 when the gateway fails.
#[instrument(skip(staff, state), fields(staff_id = %staff.id))]
pub async fn login(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, ApiError> {
    gateway(&state)?.login().await?;
    info!("WhatsApp pairing requested");
    Ok(Json(ActionResponse { success: true }))
}

/// Unpair the gateway session.
///
/// # Errors
///
/// Returns 502 when the gateway fails.
#[instrument(skip(staff, state), fields(staff_id = %staff.id))]
pub async fn logout(
    RequireAdmin(staff): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, ApiError> {
    gateway(&state)?.logout().await?;
    info!("WhatsApp session logged out");
    Ok(Json(ActionResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use brewline_platform::whatsapp::{GatewayStatus, WhatsAppError};

    use super::*;

    #[test]
    fn test_status_response_from_snapshot() {
        let snapshot = MonitorSnapshot {
            status: GatewayStatus {
                connected: true,
                phone: Some("6281299990000".to_owned()),
                state: Some("open".to_owned()),
            },
            error: Some("timeout".to_owned()),
            checked_at: Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).single(),
        };
        let response = StatusResponse::from(snapshot);
        // A failed last poll reads as disconnected.
        assert!(!response.connected);
        assert_eq!(response.checked_at.as_deref(), Some("2026-10-16T03:00:00+00:00"));
    }

    #[test]
    fn test_api_error_keeps_status() {
        let err = ApiError::from(WhatsAppError::AlreadyConnected);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.error, "WhatsApp is already connected");

        let err = ApiError::from(AppError::Unavailable("not configured".to_owned()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
