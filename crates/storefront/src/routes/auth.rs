//! Authentication route handlers.
//!
//! Handles login, registration and password reset through the platform
//! auth API, plus OAuth sign-in with PKCE. Every successful sign-in makes
//! sure a profile row exists for the user.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use brewline_core::messages::Flash;
use brewline_core::{Email, UserId};
use brewline_platform::auth::{AuthError, AuthSession, OAuthProvider, Pkce, SignUpOutcome};

use crate::db::ProfileRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    PageContext, clear_current_customer, platform_tokens, push_flash, set_current_customer,
};
use crate::models::{CurrentCustomer, OAuthPending, PlatformTokens, session_keys};
use crate::state::AppState;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Where to go after signing in.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Parameters the auth service appends to the OAuth callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub next: String,
    pub email: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub full_name: String,
    pub email: String,
    pub error: Option<String>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot.html")]
pub struct ForgotPasswordTemplate {
    pub page: PageContext,
    pub error: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Only same-site paths are followed after sign-in.
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_owned()
        }
        _ => "/".to_owned(),
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Store the platform session and make sure the profile exists.
async fn sign_in(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
) -> Result<CurrentCustomer, AppError> {
    let user = &auth.user;
    let id = UserId::new(user.id);
    let profile = ProfileRepository::new(state.pool())
        .ensure(id, user.email.as_deref(), user.full_name(), user.avatar_url())
        .await?;

    let customer = CurrentCustomer {
        id,
        email: user.email.clone(),
        name: profile.display_name().to_owned(),
    };
    let tokens = PlatformTokens {
        access_token: auth.access_token,
        refresh_token: auth.refresh_token,
    };
    set_current_customer(session, &customer, &tokens).await?;
    set_sentry_user(&customer.id, customer.email.as_deref());
    info!(user_id = %customer.id, "Customer signed in");
    Ok(customer)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(page))]
pub async fn login_page(page: PageContext, Query(query): Query<NextQuery>) -> LoginTemplate {
    LoginTemplate {
        page,
        next: safe_next(query.next.as_deref()),
        email: String::new(),
        error: None,
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, page, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());
    let email = form.email.trim().to_lowercase();

    match state
        .auth()
        .sign_in_with_password(&email, &form.password)
        .await
    {
        Ok(auth) => {
            let customer = sign_in(&state, &session, auth).await?;
            push_flash(&session, Flash::success(format!("Welcome back, {}!", customer.name))).await;
            Ok(Redirect::to(&next).into_response())
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::Api { .. })) => {
            warn!(error = %e, "Login failed");
            Ok(LoginTemplate {
                page,
                next,
                email,
                error: Some(AppError::from(e).user_message()),
            }
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(page))]
pub async fn register_page(page: PageContext) -> RegisterTemplate {
    RegisterTemplate {
        page,
        full_name: String::new(),
        email: String::new(),
        error: None,
    }
}

fn check_registration(form: &RegisterForm) -> Result<Email, String> {
    if form.full_name.trim().is_empty() {
        return Err("Please tell us your name".to_owned());
    }
    let email = Email::parse(&form.email).map_err(|e| e.to_string())?;
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if form.password != form.password_confirm {
        return Err("Passwords do not match".to_owned());
    }
    Ok(email)
}

/// Handle registration form submission.
///
/// When the platform requires email confirmation the customer is sent back
/// to the login page with a note to check their inbox.
#[instrument(skip(state, session, page, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let rerender = |page: PageContext, error: String| RegisterTemplate {
        page,
        full_name: form.full_name.clone(),
        email: form.email.clone(),
        error: Some(error),
    };

    let email = match check_registration(&form) {
        Ok(email) => email,
        Err(error) => return Ok(rerender(page, error).into_response()),
    };

    match state
        .auth()
        .sign_up(email.as_str(), &form.password, form.full_name.trim())
        .await
    {
        Ok(SignUpOutcome::SignedIn(auth)) => {
            sign_in(&state, &session, *auth).await?;
            push_flash(&session, Flash::success("Welcome to Brewline!")).await;
            Ok(Redirect::to("/menu").into_response())
        }
        Ok(SignUpOutcome::ConfirmationRequired(user)) => {
            ProfileRepository::new(state.pool())
                .ensure(
                    UserId::new(user.id),
                    Some(email.as_str()),
                    form.full_name.trim(),
                    None,
                )
                .await?;
            push_flash(
                &session,
                Flash::info(format!(
                    "We sent a confirmation link to {email}. Confirm it, then sign in."
                )),
            )
            .await;
            Ok(Redirect::to("/auth/login").into_response())
        }
        Err(e @ AuthError::Api { .. }) => {
            warn!(error = %e, "Registration refused");
            Ok(rerender(page, AppError::from(e).user_message()).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out locally and revoke the platform session. The cart is kept.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    if let Some(tokens) = platform_tokens(&session).await
        && let Err(e) = state.auth().sign_out(&tokens.access_token).await
    {
        warn!(error = %e, "Platform sign-out failed; clearing local session anyway");
    }

    clear_current_customer(&session).await?;
    clear_sentry_user();
    push_flash(&session, Flash::info("You have been signed out")).await;
    Ok(Redirect::to("/"))
}

// =============================================================================
// Password Reset
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(page))]
pub async fn forgot_page(page: PageContext) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate { page, error: None }
}

/// Ask the platform to mail a reset link.
///
/// The reply is the same whether or not the address has an account.
#[instrument(skip(state, session, page, form))]
pub async fn forgot(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            return Ok(ForgotPasswordTemplate {
                page,
                error: Some(e.to_string()),
            }
            .into_response());
        }
    };

    let redirect_to = format!("{}/auth/login", state.config().base_url);
    match state.auth().recover(email.as_str(), Some(&redirect_to)).await {
        Ok(()) | Err(AuthError::Api { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    push_flash(
        &session,
        Flash::info("If that email has an account, a reset link is on its way."),
    )
    .await;
    Ok(Redirect::to("/auth/login").into_response())
}

// =============================================================================
// OAuth (PKCE)
// =============================================================================

/// Start an OAuth sign-in.
///
/// The PKCE verifier and a random state stay in the session; the state also
/// rides along in the callback URL so the callback can match them up.
#[instrument(skip(state, session))]
pub async fn oauth_start(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Redirect, AppError> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("provider {provider}")))?;

    let pkce = Pkce::generate();
    let pending = OAuthPending {
        state: random_state(),
        verifier: pkce.verifier,
        return_to: Some(safe_next(query.next.as_deref())),
    };
    let redirect_to = format!(
        "{}/auth/callback?state={}",
        state.config().base_url,
        pending.state
    );
    let url = state
        .auth()
        .authorize_url(provider, &redirect_to, &pkce.challenge)?;

    session.insert(session_keys::OAUTH_PENDING, &pending).await?;
    Ok(Redirect::to(url.as_str()))
}

/// Finish an OAuth sign-in.
#[instrument(skip(state, session, query))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let pending: Option<OAuthPending> = session.remove(session_keys::OAUTH_PENDING).await?;

    if let Some(error) = query.error {
        warn!(error = %error, description = ?query.error_description, "OAuth provider returned an error");
        push_flash(&session, Flash::error("Sign-in was cancelled or failed. Please try again.")).await;
        return Ok(Redirect::to("/auth/login"));
    }

    let (Some(pending), Some(code)) = (pending, query.code) else {
        push_flash(&session, Flash::error("Your sign-in link expired. Please try again.")).await;
        return Ok(Redirect::to("/auth/login"));
    };
    if query.state.as_deref() != Some(pending.state.as_str()) {
        warn!("OAuth state mismatch");
        push_flash(&session, Flash::error("Your sign-in link expired. Please try again.")).await;
        return Ok(Redirect::to("/auth/login"));
    }

    let auth = state.auth().exchange_code(&code, &pending.verifier).await?;
    let customer = sign_in(&state, &session, auth).await?;
    push_flash(&session, Flash::success(format!("Welcome, {}!", customer.name))).await;

    let next = safe_next(pending.return_to.as_deref());
    Ok(Redirect::to(&next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_only_allows_local_paths() {
        assert_eq!(safe_next(Some("/orders/abc")), "/orders/abc");
        assert_eq!(safe_next(Some("/menu?category=coffee")), "/menu?category=coffee");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_registration_checks() {
        let form = |name: &str, email: &str, pw: &str, confirm: &str| RegisterForm {
            full_name: name.to_owned(),
            email: email.to_owned(),
            password: pw.to_owned(),
            password_confirm: confirm.to_owned(),
        };

        assert!(check_registration(&form("Sari", "sari@example.com", "longenough", "longenough")).is_ok());
        assert_eq!(
            check_registration(&form("", "sari@example.com", "longenough", "longenough")),
            Err("Please tell us your name".to_owned())
        );
        assert!(check_registration(&form("Sari", "not-an-email", "longenough", "longenough")).is_err());
        assert_eq!(
            check_registration(&form("Sari", "sari@example.com", "short", "short")),
            Err("Password must be at least 8 characters".to_owned())
        );
        assert_eq!(
            check_registration(&form("Sari", "sari@example.com", "longenough", "different")),
            Err("Passwords do not match".to_owned())
        );
    }

    #[test]
    fn test_oauth_state_is_random_and_url_safe() {
        let a = random_state();
        assert_ne!(a, random_state());
        assert_eq!(a.len(), 22);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
