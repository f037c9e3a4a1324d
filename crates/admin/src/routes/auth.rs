//! Authentication route handlers for admin.
//!
//! Staff sign in with the same platform email/password accounts the
//! storefront uses; only profiles with the staff or admin role get in.

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use brewline_core::UserId;
use brewline_core::messages::Flash;
use brewline_platform::auth::AuthError;

use crate::db::ProfileRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_staff, push_flash, set_current_staff, take_flash};
use crate::models::CurrentStaff;
use crate::state::AppState;
use crate::views::render;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginPageTemplate {
    pub flashes: Vec<Flash>,
    pub email: String,
    pub error: Option<String>,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

/// Render the login page.
///
/// GET /auth/login
async fn login_page(session: Session) -> Html<String> {
    render(&LoginPageTemplate {
        flashes: take_flash(&session).await,
        email: String::new(),
        error: None,
    })
}

fn login_error(email: String, message: &str) -> Response {
    render(&LoginPageTemplate {
        flashes: Vec::new(),
        email,
        error: Some(message.to_owned()),
    })
    .into_response()
}

/// Check the password with the platform, then the profile role.
///
/// POST /auth/login
#[instrument(skip(state, session, form))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = form.email.trim().to_lowercase();

    let auth = match state
        .auth()
        .sign_in_with_password(&email, &form.password)
        .await
    {
        Ok(auth) => auth,
        Err(AuthError::InvalidCredentials) => {
            return Ok(login_error(email, "Invalid email or password"));
        }
        Err(AuthError::Api { status, message }) if status < 500 => {
            warn!(status, %message, "Staff sign in rejected");
            return Ok(login_error(email, "Invalid email or password"));
        }
        Err(e) => return Err(e.into()),
    };

    let user = &auth.user;
    let id = UserId::new(user.id);
    let profile = ProfileRepository::new(state.pool())
        .ensure(id, user.email.as_deref(), user.full_name(), user.avatar_url())
        .await?;

    if !profile.role.can_access_back_office() {
        warn!(user_id = %id, "Sign in refused for non-staff account");
        return Ok(login_error(
            email,
            "This account does not have access to the back office",
        ));
    }

    let staff = CurrentStaff {
        id,
        email: profile.email.clone().unwrap_or(email),
        name: profile.display_name().to_owned(),
        role: profile.role,
    };
    set_current_staff(&session, &staff).await?;
    set_sentry_user(&staff.id, Some(&staff.email));
    info!(user_id = %staff.id, role = %staff.role, "Staff signed in");

    push_flash(&session, Flash::success(format!("Welcome, {}", staff.name))).await;
    Ok(Redirect::to("/").into_response())
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_staff(&session).await {
        warn!(error = %e, "Failed to clear staff session");
    }
    clear_sentry_user();
    Redirect::to("/auth/login")
}
