//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in customer in route handlers.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, PlatformTokens, session_keys};

/// Extractor that requires a signed-in customer.
///
/// If the customer is not logged in, returns a redirect to the login page
/// that comes back to the requested page afterwards.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(customer): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Error returned when authentication is required but the customer is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for SSE and HTMX requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&format!(
                "/auth/login?next={}",
                urlencoding::encode(&next)
            ))
            .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let customer: CurrentCustomer = session
            .get(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                let background = parts.headers.contains_key("hx-request")
                    || parts.uri.path().ends_with("/events");
                if background {
                    AuthRejection::Unauthorized
                } else {
                    // nested routers see a stripped uri
                    let uri = parts
                        .extensions
                        .get::<OriginalUri>()
                        .map_or(&parts.uri, |OriginalUri(uri)| uri);
                    AuthRejection::RedirectToLogin(
                        uri.path_and_query()
                            .map_or_else(|| "/".to_owned(), ToString::to_string),
                    )
                }
            })?;

        Ok(Self(customer))
    }
}

/// Store the signed-in customer and their platform tokens.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
    tokens: &PlatformTokens,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await?;
    session.insert(session_keys::PLATFORM_TOKENS, tokens).await
}

/// Platform tokens for the signed-in customer, if any.
pub async fn platform_tokens(session: &Session) -> Option<PlatformTokens> {
    session
        .get::<PlatformTokens>(session_keys::PLATFORM_TOKENS)
        .await
        .ok()
        .flatten()
}

/// Helper to clear the current customer from the session (logout).
///
/// The cart survives logout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    session
        .remove::<PlatformTokens>(session_keys::PLATFORM_TOKENS)
        .await?;
    Ok(())
}
