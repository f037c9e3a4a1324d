//! Authentication extractors for the back office.
//!
//! Every page except login needs a signed-in staff member. Catalog,
//! promos and settings additionally need the admin role.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentStaff, session_keys};

/// Extractor that requires a signed-in staff member (staff or admin role).
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireStaff(staff): RequireStaff) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff(pub CurrentStaff);

/// Extractor that requires the admin role.
///
/// A signed-in staff member without it gets 403 Forbidden.
pub struct RequireAdmin(pub CurrentStaff);

/// Why a request was turned away.
#[derive(Debug, PartialEq, Eq)]
pub enum StaffAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API and event-stream requests).
    Unauthorized,
    /// Signed in, but the role does not allow this page.
    Forbidden,
}

impl IntoResponse for StaffAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Only admins can access this page",
            )
                .into_response(),
        }
    }
}

/// Non-HTML requests get a bare 401 instead of a login redirect.
fn wants_status_code(parts: &Parts) -> bool {
    let path = parts.uri.path();
    path.starts_with("/api/") || path.ends_with("/events")
}

async fn current_staff(parts: &Parts) -> Result<CurrentStaff, StaffAuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(StaffAuthRejection::Unauthorized)?;

    session
        .get::<CurrentStaff>(session_keys::CURRENT_STAFF)
        .await
        .ok()
        .flatten()
        .filter(|staff| staff.role.can_access_back_office())
        .ok_or_else(|| {
            if wants_status_code(parts) {
                StaffAuthRejection::Unauthorized
            } else {
                StaffAuthRejection::RedirectToLogin
            }
        })
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = StaffAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_staff(parts).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = StaffAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let staff = current_staff(parts).await?;
        if !staff.is_admin() {
            return Err(StaffAuthRejection::Forbidden);
        }
        Ok(Self(staff))
    }
}

/// Helper to set the current staff member in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Helper to clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentStaff>(session_keys::CURRENT_STAFF)
        .await?;
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use tower_sessions::MemoryStore;

    use brewline_core::{ProfileRole, UserId};

    use super::*;

    fn staff(role: ProfileRole) -> CurrentStaff {
        CurrentStaff {
            id: UserId::new(uuid::Uuid::nil()),
            email: "barista@brewline.test".to_owned(),
            name: "Sari".to_owned(),
            role,
        }
    }

    async fn parts_for(path: &str, signed_in: Option<CurrentStaff>) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        if let Some(staff) = signed_in {
            session
                .insert(session_keys::CURRENT_STAFF, staff)
                .await
                .unwrap();
        }
        let (mut parts, ()) = Request::get(path).body(()).unwrap().into_parts();
        parts.extensions.insert(session);
        parts
    }

    #[tokio::test]
    async fn test_anonymous_page_redirects_and_api_gets_401() {
        let mut page = parts_for("/orders", None).await;
        let rejection = RequireStaff::from_request_parts(&mut page, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, StaffAuthRejection::RedirectToLogin);

        let mut api = parts_for("/api/whatsapp/status", None).await;
        let rejection = RequireStaff::from_request_parts(&mut api, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, StaffAuthRejection::Unauthorized);

        let mut events = parts_for("/orders/events", None).await;
        let rejection = RequireStaff::from_request_parts(&mut events, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, StaffAuthRejection::Unauthorized);
    }

    #[tokio::test]
    async fn test_staff_cannot_open_admin_pages() {
        let mut parts = parts_for("/products", Some(staff(ProfileRole::Staff))).await;
        assert!(RequireStaff::from_request_parts(&mut parts, &()).await.is_ok());

        let rejection = RequireAdmin::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, StaffAuthRejection::Forbidden);

        let mut parts = parts_for("/products", Some(staff(ProfileRole::Admin))).await;
        assert!(RequireAdmin::from_request_parts(&mut parts, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_customer_session_is_treated_as_signed_out() {
        let mut parts = parts_for("/", Some(staff(ProfileRole::Customer))).await;
        let rejection = RequireStaff::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection, StaffAuthRejection::RedirectToLogin);
    }
}
