//! User-facing feedback: flash messages and friendlier error text.

use serde::{Deserialize, Serialize};

pub const NETWORK_MESSAGE: &str =
    "We couldn't reach the server. Check your connection and try again.";
pub const TIMEOUT_MESSAGE: &str = "The server took too long to respond. Please try again.";
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Turn raw error text into something a customer or barista can act on.
///
/// Matching is by substring, case-insensitive. Timeouts are checked first
/// because timeout errors usually mention the connection too.
#[must_use]
pub fn friendly_error(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TIMEOUT_MESSAGE
    } else if ["network", "connection", "connect", "fetch"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        NETWORK_MESSAGE
    } else {
        GENERIC_MESSAGE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "toast-success",
            Self::Error => "toast-error",
            Self::Info => "toast-info",
        }
    }
}

/// A one-shot toast shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_wins_over_connection() {
        assert_eq!(
            friendly_error("error sending request: operation timed out"),
            TIMEOUT_MESSAGE
        );
        assert_eq!(friendly_error("Connection TIMEOUT"), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_network_failures() {
        assert_eq!(friendly_error("TypeError: Failed to fetch"), NETWORK_MESSAGE);
        assert_eq!(friendly_error("tcp connect error"), NETWORK_MESSAGE);
        assert_eq!(friendly_error("NetworkError when attempting"), NETWORK_MESSAGE);
    }

    #[test]
    fn test_everything_else_is_generic() {
        assert_eq!(friendly_error("duplicate key value"), GENERIC_MESSAGE);
        assert_eq!(friendly_error(""), GENERIC_MESSAGE);
    }
}
