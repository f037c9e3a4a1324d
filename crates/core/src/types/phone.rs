//! Phone numbers in the international form the WhatsApp gateway expects.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number cannot be empty")]
    Empty,
    #[error("phone number may only contain digits, spaces, dashes and a leading +")]
    InvalidCharacter,
    #[error("phone number must start with 0, 8, 62 or +62")]
    UnsupportedPrefix,
    #[error("phone number must have between {min} and {max} digits")]
    Length { min: usize, max: usize },
}

/// A normalized Indonesian mobile number, digits only, starting with `62`.
///
/// Local forms are rewritten: `0812...` and `812...` both become `62812...`.
///
/// ```
/// use brewline_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("0812-3456-7890").unwrap();
/// assert_eq!(phone.as_str(), "6281234567890");
/// assert_eq!(phone.display(), "+6281234567890");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub const MIN_DIGITS: usize = 10;
    pub const MAX_DIGITS: usize = 15;

    /// Normalize user input into gateway form.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the input is empty, has stray characters,
    /// uses a prefix other than `0`, `8` or `62`, or has the wrong length.
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let mut digits = String::with_capacity(without_plus.len());
        for c in without_plus.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacter),
            }
        }

        let normalized = if let Some(rest) = digits.strip_prefix('0') {
            format!("62{rest}")
        } else if digits.starts_with("62") {
            digits
        } else if digits.starts_with('8') {
            format!("62{digits}")
        } else {
            return Err(PhoneError::UnsupportedPrefix);
        };

        if normalized.len() < Self::MIN_DIGITS || normalized.len() > Self::MAX_DIGITS {
            return Err(PhoneError::Length {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(normalized))
    }

    /// Digits only, e.g. `6281234567890`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human form with a leading `+`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("+{}", self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_local_forms_normalize_to_country_code() {
        for input in [
            "081234567890",
            "0812-3456-7890",
            "0812 3456 7890",
            "81234567890",
            "6281234567890",
            "+62 812 3456 7890",
            "(0812) 3456.7890",
        ] {
            assert_eq!(
                PhoneNumber::parse(input).unwrap().as_str(),
                "6281234567890",
                "{input}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(PhoneNumber::parse(" "), Err(PhoneError::Empty));
        assert_eq!(
            PhoneNumber::parse("0812abc"),
            Err(PhoneError::InvalidCharacter)
        );
        assert_eq!(
            PhoneNumber::parse("+1 415 555 0100"),
            Err(PhoneError::UnsupportedPrefix)
        );
        assert!(matches!(
            PhoneNumber::parse("0812"),
            Err(PhoneError::Length { .. })
        ));
        assert!(matches!(
            PhoneNumber::parse("08123456789012345"),
            Err(PhoneError::Length { .. })
        ));
    }

    #[test]
    fn test_display_adds_plus() {
        let phone = PhoneNumber::parse("0811111111").unwrap();
        assert_eq!(phone.display(), "+62811111111");
    }
}
