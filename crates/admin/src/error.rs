//! Unified error handling for admin.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use brewline_core::messages::friendly_error;
use brewline_platform::auth::AuthError;
use brewline_platform::db::RepositoryError;
use brewline_platform::storage::StorageError;
use brewline_platform::whatsapp::WhatsAppError;

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Platform auth API call failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Image upload or removal failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// WhatsApp gateway call failed.
    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] WhatsAppError),

    /// Session store read or write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An optional integration is not configured.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
                | Self::Auth(AuthError::Request(_) | AuthError::Response(_) | AuthError::Config(_))
                | Self::Storage(
                    StorageError::Request(_) | StorageError::Api { .. } | StorageError::Config(_)
                )
                | Self::WhatsApp(
                    WhatsAppError::Request(_) | WhatsAppError::Response(_) | WhatsAppError::Config(_)
                )
                | Self::Session(_)
                | Self::Internal(_)
        )
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_)
                | RepositoryError::OutOfStock(_)
                | RepositoryError::Transition(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(AuthError::InvalidCredentials) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Storage(StorageError::UnsupportedType(_) | StorageError::Empty) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(StorageError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::WhatsApp(WhatsAppError::AlreadyConnected) => StatusCode::CONFLICT,
            Self::Auth(_) | Self::Storage(_) | Self::WhatsApp(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Text safe to show staff in a flash message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                "That record no longer exists.".to_owned()
            }
            Self::Database(RepositoryError::Transition(e)) => {
                format!("Not allowed: {e}. Refresh to see the latest status.")
            }
            Self::Database(RepositoryError::Conflict(what)) => format!("Conflict: {what}"),
            Self::Database(RepositoryError::OutOfStock(name)) => format!("{name} is out of stock"),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_owned(),
            Self::Storage(
                e @ (StorageError::UnsupportedType(_) | StorageError::TooLarge | StorageError::Empty),
            ) => format!("Image rejected: {e}"),
            Self::WhatsApp(WhatsAppError::AlreadyConnected) => {
                "WhatsApp is already connected".to_owned()
            }
            Self::Unauthorized(_) => "Please sign in to continue".to_owned(),
            Self::Forbidden(message) | Self::BadRequest(message) | Self::Unavailable(message) => {
                message.clone()
            }
            other => friendly_error(&other.to_string()).to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        (self.status(), self.user_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in staff member.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use brewline_core::OrderStatus;
    use brewline_core::types::TransitionError;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 42".to_string());
        assert_eq!(err.to_string(), "Not found: order 42");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Storage(StorageError::TooLarge)),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            get_status(AppError::WhatsApp(WhatsAppError::Request("down".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejected_transition_is_a_conflict() {
        let err = AppError::Database(RepositoryError::Transition(TransitionError {
            from: OrderStatus::Completed,
            to: OrderStatus::Processing,
        }));
        assert!(err.user_message().contains("Refresh"));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_gateway_failures_get_friendly_text() {
        let err = AppError::WhatsApp(WhatsAppError::Request("connection refused".to_string()));
        assert!(!err.user_message().contains("refused"));
    }
}
