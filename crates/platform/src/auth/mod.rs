//! Client for the platform auth REST API.
//!
//! The storefront and admin never see passwords beyond forwarding them
//! here; the platform owns users, credentials and OAuth providers. Each
//! binary keeps the returned tokens in its own server-side session.
//!
//! # Endpoints
//!
//! - `POST /auth/v1/signup`
//! - `POST /auth/v1/token?grant_type=password|refresh_token|pkce`
//! - `GET  /auth/v1/authorize` (browser redirect target)
//! - `GET  /auth/v1/user`
//! - `POST /auth/v1/logout`
//! - `POST /auth/v1/recover`

mod pkce;
mod types;

pub use pkce::{Pkce, challenge_for};
pub use types::{AuthSession, AuthUser, OAuthProvider, SignUpOutcome};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::PlatformConfig;
use types::ApiErrorBody;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The HTTP request could not be sent.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The response body was not what the API documents.
    #[error("auth response error: {0}")]
    Response(String),

    /// Wrong email/password, or an expired/used authorization code.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("auth API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("auth configuration error: {0}")]
    Config(String),
}

/// Platform auth API client.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base: Url,
    anon_key: SecretString,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base", &self.base.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: &PlatformConfig) -> Self {
        Self::with_base(config.url.clone(), config.anon_key.clone())
    }

    #[must_use]
    pub fn with_base(base: Url, anon_key: SecretString) -> Self {
        Self {
            http: Client::new(),
            base,
            anon_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(&format!("auth/v1/{path}"))
            .map_err(|e| AuthError::Config(format!("invalid auth URL: {e}")))
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", self.anon_key.expose_secret())
    }

    /// Register with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` when the platform rejects the sign-up
    /// (e.g. the email is taken or the password is too weak).
    #[instrument(skip(self, password, full_name))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let response = self
            .request(self.http.post(self.endpoint("signup")?))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let value: serde_json::Value = parse(response).await?;
        if value.get("access_token").is_some() {
            let session: AuthSession = serde_json::from_value(value)
                .map_err(|e| AuthError::Response(e.to_string()))?;
            debug!(user_id = %session.user.id, "Signed up and signed in");
            return Ok(SignUpOutcome::SignedIn(Box::new(session)));
        }

        // Without a session the body is either the user itself or wraps it.
        let user_value = value.get("user").cloned().unwrap_or(value);
        let user: AuthUser =
            serde_json::from_value(user_value).map_err(|e| AuthError::Response(e.to_string()))?;
        debug!(user_id = %user.id, "Signed up, confirmation pending");
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a wrong email/password.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        self.token("password", &Credentials { email, password })
            .await
    }

    /// Trade a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the refresh token was
    /// revoked or already used.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Where to send the browser to start an OAuth sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the base URL cannot be joined.
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, AuthError> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    /// Finish an OAuth sign-in with the code from the callback.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the code or verifier is
    /// wrong or expired.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, AuthError> {
        self.token(
            "pkce",
            &serde_json::json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `AuthError::Api` with status 401 if the token is invalid.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .request(self.http.get(self.endpoint("user")?))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        parse(response).await
    }

    /// Revoke the session server side.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Request` if the platform is unreachable.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .request(self.http.post(self.endpoint("logout")?))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        // An already-expired token is as signed out as it gets.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        check(response).await.map(drop)
    }

    /// Send a password reset mail.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` if the platform refuses (rate limits).
    #[instrument(skip(self))]
    pub async fn recover(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let mut url = self.endpoint("recover")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        let response = self
            .request(self.http.post(url))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        check(response).await.map(drop)
    }

    async fn token<B: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .request(self.http.post(url))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            warn!(grant_type, "Token request rejected");
            return Err(AuthError::InvalidCredentials);
        }
        parse(response).await
    }
}

/// Turn a non-2xx response into `AuthError::Api`.
async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    Err(AuthError::Api {
        status: status.as_u16(),
        message: body.into_message(),
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    check(response)
        .await?
        .json()
        .await
        .map_err(|e| AuthError::Response(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_ID: &str = "6f1c1b8e-8a6b-4e77-9d43-0b8a4f3c2d10";

    fn client(server: &MockServer) -> AuthClient {
        let base = Url::parse(&format!("{}/", server.uri())).expect("mock url");
        AuthClient::with_base(base, SecretString::from("anon-key"))
    }

    fn session_body() -> serde_json::Value {
        json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": USER_ID,
                "email": "sari@example.com",
                "user_metadata": { "full_name": "Sari Dewi" }
            }
        })
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({ "email": "sari@example.com", "password": "kopi-susu-123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .mount(&server)
            .await;

        let session = client(&server)
            .sign_in_with_password("sari@example.com", "kopi-susu-123")
            .await
            .expect("sign in");

        assert_eq!(session.access_token, "access");
        assert_eq!(session.user.full_name(), "Sari Dewi");
        assert!(!format!("{session:?}").contains("refresh\""));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .sign_in_with_password("sari@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_without_session_needs_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": USER_ID,
                "email": "sari@example.com",
                "user_metadata": { "full_name": "Sari Dewi" }
            })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .sign_up("sari@example.com", "kopi-susu-123", "Sari Dewi")
            .await
            .expect("sign up");
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(u) if u.id.to_string() == USER_ID));
    }

    #[tokio::test]
    async fn test_sign_up_with_session_signs_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .sign_up("sari@example.com", "kopi-susu-123", "Sari Dewi")
            .await
            .expect("sign up");
        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "msg": "User already registered" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .sign_up("sari@example.com", "kopi-susu-123", "Sari")
            .await
            .unwrap_err();
        match err {
            AuthError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "User already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .and(body_json(json!({ "auth_code": "code-1", "code_verifier": "verifier-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .mount(&server)
            .await;

        let session = client(&server)
            .exchange_code("code-1", "verifier-1")
            .await
            .expect("exchange");
        assert_eq!(session.user.email.as_deref(), Some("sari@example.com"));
    }

    #[tokio::test]
    async fn test_get_user_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(bearer_token("access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": USER_ID,
                "email": "sari@example.com",
                "user_metadata": { "name": "Sari", "picture": "https://img/sari.png" }
            })))
            .mount(&server)
            .await;

        let user = client(&server).get_user("access").await.expect("user");
        assert_eq!(user.full_name(), "Sari");
        assert_eq!(user.avatar_url(), Some("https://img/sari.png"));
    }

    #[tokio::test]
    async fn test_sign_out_tolerates_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        client(&server).sign_out("stale").await.expect("sign out");
    }

    #[test]
    fn test_authorize_url() {
        let client = AuthClient::with_base(
            Url::parse("https://platform.test/").expect("url"),
            SecretString::from("anon-key"),
        );
        let url = client
            .authorize_url(OAuthProvider::Google, "https://shop.test/auth/callback", "abc")
            .expect("url");

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".into(), "google".into())));
        assert!(pairs.contains(&("code_challenge_method".into(), "s256".into())));
        assert!(pairs.contains(&("redirect_to".into(), "https://shop.test/auth/callback".into())));
    }
}
