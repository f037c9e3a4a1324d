//! Email addresses as entered at sign-up and shown in the customer directory.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an email address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be between {min} and {max} characters")]
    Length { min: usize, max: usize },
    #[error("email cannot contain spaces")]
    Whitespace,
    #[error("email must contain exactly one @")]
    AtSymbol,
    #[error("email is missing the part before the @")]
    EmptyLocalPart,
    #[error("email domain looks incomplete")]
    InvalidDomain,
}

/// A normalized (trimmed, lower-cased) email address.
///
/// ```
/// use brewline_core::Email;
///
/// let email = Email::parse("  Barista@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "barista@example.com");
/// assert!(Email::parse("barista@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub const MIN_LENGTH: usize = 3;
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first problem found.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() < Self::MIN_LENGTH || s.len() > Self::MAX_LENGTH {
            return Err(EmailError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let mut parts = s.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EmailError::AtSymbol);
        };
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..");
        if !domain_ok {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(s.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Everything after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, d)| d)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Stored addresses come from the auth service and are trusted as-is.
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        for ok in [
            "ani@kopi.id",
            "ani.putri+pesanan@kopi.co.id",
            "a@b.co",
            "BUDI@Mail.Example.com",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let email = Email::parse("  Ani@Kopi.ID\n").unwrap();
        assert_eq!(email.as_str(), "ani@kopi.id");
        assert_eq!(email.domain(), "kopi.id");
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("ani kopi@x.id"), Err(EmailError::Whitespace));
        assert_eq!(Email::parse("ani.kopi.id"), Err(EmailError::AtSymbol));
        assert_eq!(Email::parse("a@b@c.id"), Err(EmailError::AtSymbol));
        assert_eq!(Email::parse("@kopi.id"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("ani@kopi"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ani@.kopi"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ani@kopi..id"), Err(EmailError::InvalidDomain));
    }

    #[test]
    fn test_rejects_overlong_addresses() {
        let long = format!("{}@kopi.id", "a".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::Length { .. })));
    }

    #[test]
    fn test_deserialize_validates() {
        let parsed: Email = serde_json::from_str("\"Ani@Kopi.id\"").unwrap();
        assert_eq!(parsed.as_str(), "ani@kopi.id");
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
    }
}
