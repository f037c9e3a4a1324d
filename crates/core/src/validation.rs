//! Field-level validation errors for admin and storefront forms.

use core::fmt;

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a submitted form, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// A single-field error.
    #[must_use]
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.push(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The first message for `field`, for rendering next to the input.
    #[must_use]
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Append another set of errors, e.g. parse failures found before the
    /// typed draft could be validated.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn finish(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(&error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Length in characters (not bytes) of trimmed input.
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.trim().chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_in_order() {
        let mut errors = ValidationError::default();
        errors.check(true, "name", "unused");
        errors.check(false, "name", "Name is required");
        errors.check(false, "price", "Price must be above zero");

        assert_eq!(errors.errors().len(), 2);
        assert_eq!(errors.message_for("price"), Some("Price must be above zero"));
        assert_eq!(
            errors.to_string(),
            "Name is required; Price must be above zero"
        );
        assert!(errors.finish().is_err());
    }

    #[test]
    fn test_merge_keeps_both_sets() {
        let mut parse = ValidationError::field("price", "Enter a valid amount");
        parse.merge(ValidationError::field("name", "Name is required"));
        assert_eq!(parse.errors().len(), 2);
        assert_eq!(parse.message_for("name"), Some("Name is required"));
    }

    #[test]
    fn test_empty_finishes_ok() {
        assert!(ValidationError::default().finish().is_ok());
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert_eq!(char_len("  kopi susu  "), 9);
        assert_eq!(char_len("gula aren ☕"), 11);
    }
}
