//! Environment configuration shared by the storefront and admin binaries.
//!
//! # Environment Variables
//!
//! ## Platform
//! - `PLATFORM_URL` - Base URL of the backend platform (auth + storage REST)
//! - `PLATFORM_ANON_KEY` - Public API key sent with every request
//! - `PLATFORM_SERVICE_ROLE_KEY` - Privileged key for storage writes (admin only)
//! - `PLATFORM_STORAGE_BUCKET` - Bucket for menu and banner images (default: menu-images)
//!
//! ## WhatsApp gateway (optional; notifications are disabled when unset)
//! - `WHATSAPP_GATEWAY_URL` - Base URL of the gateway HTTP API
//! - `WHATSAPP_GATEWAY_KEY` - API key sent as `x-api-key`
//! - `WHATSAPP_POLL_SECONDS` - Status poll interval (default: 5)

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Substrings that give away a copied-from-docs value (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Backend platform endpoints and keys.
///
/// Implements `Debug` manually to redact keys.
#[derive(Clone)]
pub struct PlatformConfig {
    pub url: Url,
    pub anon_key: SecretString,
    /// Only the admin binary loads this; the storefront never writes storage.
    pub service_role_key: Option<SecretString>,
    pub storage_bucket: String,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("storage_bucket", &self.storage_bucket)
            .finish()
    }
}

impl PlatformConfig {
    /// Load the public platform settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `PLATFORM_URL` or `PLATFORM_ANON_KEY` is
    /// missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::url("PLATFORM_URL")?,
            anon_key: env::required_secret("PLATFORM_ANON_KEY")?,
            service_role_key: None,
            storage_bucket: env::or_default("PLATFORM_STORAGE_BUCKET", "menu-images"),
        })
    }

    /// Load the platform settings including the service role key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable is missing or the service role
    /// key looks like a placeholder.
    pub fn from_env_with_service_role() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.service_role_key = Some(env::validated_secret("PLATFORM_SERVICE_ROLE_KEY")?);
        Ok(config)
    }
}

/// WhatsApp gateway connection settings.
#[derive(Clone)]
pub struct WhatsAppConfig {
    pub base_url: Url,
    pub api_key: SecretString,
    pub poll_interval: Duration,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl WhatsAppConfig {
    /// `Ok(None)` when the gateway is not configured at all.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the URL is set but invalid, the key is
    /// missing or weak, or the poll interval is not a positive integer.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if env::optional("WHATSAPP_GATEWAY_URL").is_none() {
            return Ok(None);
        }
        let poll_seconds: u64 = env::parse_or("WHATSAPP_POLL_SECONDS", 5)?;
        if poll_seconds == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "WHATSAPP_POLL_SECONDS".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }
        Ok(Some(Self {
            base_url: env::url("WHATSAPP_GATEWAY_URL")?,
            api_key: env::validated_secret("WHATSAPP_GATEWAY_KEY")?,
            poll_interval: Duration::from_secs(poll_seconds),
        }))
    }
}

/// Typed accessors over `std::env`.
pub mod env {
    use super::{ConfigError, FromStr, SecretString, Url, validate_secret_strength};

    /// # Errors
    ///
    /// Returns `MissingEnvVar` when unset.
    pub fn required(key: &str) -> Result<String, ConfigError> {
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
    }

    #[must_use]
    pub fn optional(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    #[must_use]
    pub fn or_default(key: &str, default: &str) -> String {
        optional(key).unwrap_or_else(|| default.to_owned())
    }

    /// Parse `key`, falling back to `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnvVar` when set but unparseable.
    pub fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
        })
    }

    /// A base URL, always ending in `/` so relative joins keep its path.
    ///
    /// # Errors
    ///
    /// Returns `MissingEnvVar` or `InvalidEnvVar`.
    pub fn url(key: &str) -> Result<Url, ConfigError> {
        let raw = required(key)?;
        let trimmed = raw.trim().trim_end_matches('/');
        Url::parse(&format!("{trimmed}/"))
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `MissingEnvVar` when unset.
    pub fn required_secret(key: &str) -> Result<SecretString, ConfigError> {
        required(key).map(SecretString::from)
    }

    /// A secret that must not look like a placeholder and must be random
    /// enough.
    ///
    /// # Errors
    ///
    /// Returns `MissingEnvVar` or `InsecureSecret`.
    pub fn validated_secret(key: &str) -> Result<SecretString, ConfigError> {
        let value = required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }

    /// Database URL with fallback to the generic `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns `MissingEnvVar` naming `primary_key` when neither is set.
    pub fn database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
        optional(primary_key)
            .or_else(|| optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_owned()))
    }
}

/// # Errors
///
/// Returns `InsecureSecret` when shorter than 32 characters.
pub fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let len = secret.expose_secret().len();
    if len < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("must be at least {MIN_SESSION_SECRET_LENGTH} characters (got {len})"),
        ));
    }
    Ok(())
}

/// Shannon entropy in bits per character.
#[must_use]
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_default() += 1;
    }
    #[allow(clippy::cast_precision_loss)] // secrets are short
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy values.
///
/// # Errors
///
/// Returns `InsecureSecret` describing the problem.
pub fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_uniform_and_repeated_strings() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("kkkkkkkk").abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Qm7#vX2!pL9@wK4$") > 3.3);
    }

    #[test]
    fn test_placeholders_are_rejected() {
        for value in ["your-gateway-key", "changeme-now-please", "sk_test_xxxxxxxx"] {
            assert!(
                matches!(
                    validate_secret_strength(value, "WHATSAPP_GATEWAY_KEY"),
                    Err(ConfigError::InsecureSecret(_, _))
                ),
                "{value}"
            );
        }
    }

    #[test]
    fn test_low_entropy_is_rejected() {
        let err = validate_secret_strength(&"ab".repeat(20), "KEY").unwrap_err();
        assert!(err.to_string().contains("entropy too low"));
    }

    #[test]
    fn test_random_key_is_accepted() {
        assert!(validate_secret_strength("Zr8$Nq2!bW5^tH9&yL3*cF6@pJ1#", "KEY").is_ok());
    }

    #[test]
    fn test_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("k".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = PlatformConfig {
            url: Url::parse("https://abc.platform.test").unwrap(),
            anon_key: SecretString::from("anon-value-that-should-not-leak"),
            service_role_key: Some(SecretString::from("service-value-that-should-not-leak")),
            storage_bucket: "menu-images".into(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("should-not-leak"));

        let wa = WhatsAppConfig {
            base_url: Url::parse("http://localhost:3100").unwrap(),
            api_key: SecretString::from("gateway-key-that-should-not-leak"),
            poll_interval: Duration::from_secs(5),
        };
        assert!(!format!("{wa:?}").contains("should-not-leak"));
    }
}
