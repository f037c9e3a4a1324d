//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin panel
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PLATFORM_URL`, `PLATFORM_ANON_KEY` - Backend platform
//! - `PLATFORM_SERVICE_ROLE_KEY` - Storage writes for menu and banner images (HIGH PRIVILEGE)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `WHATSAPP_GATEWAY_URL`, `WHATSAPP_GATEWAY_KEY`, `WHATSAPP_POLL_SECONDS` - Gateway
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking
//! - `SENTRY_SAMPLE_RATE` (default 1.0), `SENTRY_TRACES_SAMPLE_RATE` (default 0.1)
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for text
//!
//! ## Optional (TLS)
//! - `ADMIN_TLS_CERT` - PEM-encoded certificate chain
//! - `ADMIN_TLS_KEY` - PEM-encoded private key

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use brewline_platform::config::{
    ConfigError, PlatformConfig, WhatsAppConfig, env, validate_session_secret,
};

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin panel
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Platform settings, always with the service role key
    pub platform: PlatformConfig,
    /// `None` shows "not configured" on the settings page
    pub whatsapp: Option<WhatsAppConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    pub log_json: bool,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// TLS certificate and key, both PEM.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_parts(env::optional("ADMIN_TLS_CERT"), env::optional("ADMIN_TLS_KEY"))
    }

    fn from_parts(cert: Option<String>, key: Option<String>) -> Result<Option<Self>, ConfigError> {
        match (cert, key) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "ADMIN_TLS_*".to_owned(),
                "Both ADMIN_TLS_CERT and ADMIN_TLS_KEY must be set together".to_owned(),
            )),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let session_secret = env::validated_secret("ADMIN_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADMIN_SESSION_SECRET")?;

        Ok(Self {
            database_url: env::database_url("ADMIN_DATABASE_URL")?,
            host: env::parse_or("ADMIN_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env::parse_or("ADMIN_PORT", 3001)?,
            base_url: env::required("ADMIN_BASE_URL")?
                .trim_end_matches('/')
                .to_owned(),
            session_secret,
            platform: PlatformConfig::from_env_with_service_role()?,
            whatsapp: WhatsAppConfig::from_env()?,
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env::parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env::parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
            log_json: env::optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            tls: TlsConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Cookies are `Secure` when served over TLS or behind an HTTPS URL.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.tls.is_some() || self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_owned(),
            session_secret: SecretString::from("x".repeat(32)),
            platform: PlatformConfig {
                url: "http://localhost:54321".parse().unwrap(),
                anon_key: SecretString::from("anon"),
                service_role_key: Some(SecretString::from("service-role-key-value")),
                storage_bucket: "menu-images".to_owned(),
            },
            whatsapp: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            log_json: false,
            tls: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
    }

    #[test]
    fn test_tls_requires_both_parts() {
        assert!(TlsConfig::from_parts(None, None).unwrap().is_none());
        assert!(
            TlsConfig::from_parts(Some("cert".to_owned()), Some("key".to_owned()))
                .unwrap()
                .is_some()
        );
        assert!(matches!(
            TlsConfig::from_parts(Some("cert".to_owned()), None),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(TlsConfig::from_parts(None, Some("key".to_owned())).is_err());
    }

    #[test]
    fn test_https_follows_tls_or_base_url() {
        let mut config = test_config();
        assert!(!config.is_https());

        config.base_url = "https://admin.brewline.test".to_owned();
        assert!(config.is_https());

        config.base_url = "http://localhost:3001".to_owned();
        config.tls = Some(TlsConfig {
            cert_pem: "cert".to_owned(),
            key_pem: SecretString::from("key"),
        });
        assert!(config.is_https());
    }

    #[test]
    fn test_tls_config_debug_redacts_key() {
        let tls = TlsConfig {
            cert_pem: "-----BEGIN CERTIFICATE-----".to_owned(),
            key_pem: SecretString::from("super_secret_private_key"),
        };
        let debug_output = format!("{tls:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_private_key"));
    }

    #[test]
    fn test_config_debug_redacts_service_role_key() {
        let debug_output = format!("{:?}", test_config());
        assert!(!debug_output.contains("service-role-key-value"));
    }
}
