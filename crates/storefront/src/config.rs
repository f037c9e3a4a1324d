//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (OAuth redirects)
//! - `STOREFRONT_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//! - `PLATFORM_URL`, `PLATFORM_ANON_KEY` - Backend platform
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `WHATSAPP_GATEWAY_URL`, `WHATSAPP_GATEWAY_KEY` - Order notifications
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking
//! - `SENTRY_SAMPLE_RATE` (default 1.0), `SENTRY_TRACES_SAMPLE_RATE` (default 0.1)
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for text

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use brewline_platform::config::{
    ConfigError, PlatformConfig, WhatsAppConfig, env, validate_session_secret,
};

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    pub session_secret: SecretString,
    pub platform: PlatformConfig,
    /// `None` disables customer notifications from checkout
    pub whatsapp: Option<WhatsAppConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    pub log_json: bool,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let session_secret = env::validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url: env::database_url("STOREFRONT_DATABASE_URL")?,
            host: env::parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env::parse_or("STOREFRONT_PORT", 3000)?,
            base_url: env::required("STOREFRONT_BASE_URL")?
                .trim_end_matches('/')
                .to_owned(),
            session_secret,
            platform: PlatformConfig::from_env()?,
            whatsapp: WhatsAppConfig::from_env()?,
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env::parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env::parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
            log_json: env::optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
