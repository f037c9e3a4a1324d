//! Customer and staff profiles plus the delivery address book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AddressId, PhoneNumber, ProfileRole, UserId};
use crate::validation::{ValidationError, char_len};

/// Application profile attached to a platform auth user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Profile {
    pub id: UserId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: ProfileRole,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Name for greetings, falling back to the email's local part.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if !name.is_empty() {
            return name;
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or("Guest")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub phone: Option<PhoneNumber>,
}

impl ProfileUpdate {
    pub const MAX_NAME: usize = 100;

    /// Parse the profile form.
    ///
    /// # Errors
    ///
    /// Returns field errors for an empty or long name or an invalid phone.
    pub fn parse(full_name: &str, phone: &str) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        let len = char_len(full_name);
        errors.check(len > 0, "full_name", "Name is required");
        errors.check(
            len <= Self::MAX_NAME,
            "full_name",
            format!("Name must be at most {} characters", Self::MAX_NAME),
        );
        let phone = if phone.trim().is_empty() {
            None
        } else {
            match PhoneNumber::parse(phone) {
                Ok(p) => Some(p),
                Err(e) => {
                    errors.push("phone", e.to_string());
                    None
                }
            }
        };
        errors.finish()?;
        Ok(Self {
            full_name: full_name.trim().to_owned(),
            phone,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: String,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub is_default: bool,
}

impl Address {
    /// Snapshot written onto delivery orders.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street.trim().to_owned()];
        if !self.city.trim().is_empty() {
            parts.push(self.city.trim().to_owned());
        }
        if let Some(code) = self.postal_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            parts.push(code.to_owned());
        }
        let mut line = parts.join(", ");
        if let Some(notes) = self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            line.push_str(" (");
            line.push_str(notes);
            line.push(')');
        }
        line
    }
}

/// Validated address form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    pub label: String,
    pub recipient_name: String,
    pub phone: PhoneNumber,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub is_default: bool,
}

/// Raw address form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub label: String,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_default: Option<String>,
}

impl AddressDraft {
    /// # Errors
    ///
    /// Returns field errors for a missing recipient or street, an invalid
    /// phone, or an overlong field.
    pub fn parse(input: &AddressInput) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        errors.check(
            char_len(&input.recipient_name) > 0,
            "recipient_name",
            "Recipient name is required",
        );
        errors.check(char_len(&input.street) > 0, "street", "Street address is required");
        errors.check(
            char_len(&input.street) <= 300,
            "street",
            "Street address must be at most 300 characters",
        );
        errors.check(
            char_len(&input.notes) <= 200,
            "notes",
            "Notes must be at most 200 characters",
        );
        let phone = match PhoneNumber::parse(&input.phone) {
            Ok(p) => Some(p),
            Err(e) => {
                errors.push("phone", e.to_string());
                None
            }
        };
        errors.finish()?;

        let optional = |s: &str| Some(s.trim().to_owned()).filter(|s| !s.is_empty());
        let label = input.label.trim();
        Ok(Self {
            label: if label.is_empty() { "Home".to_owned() } else { label.to_owned() },
            recipient_name: input.recipient_name.trim().to_owned(),
            phone: phone.ok_or_else(|| ValidationError::field("phone", "Phone is required"))?,
            street: input.street.trim().to_owned(),
            city: input.city.trim().to_owned(),
            postal_code: optional(&input.postal_code),
            notes: optional(&input.notes),
            is_default: input.is_default.is_some(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            label: String::new(),
            recipient_name: " Ani Putri ".into(),
            phone: "0812-3456-7890".into(),
            street: "Jl. Kemang Raya No. 10".into(),
            city: "Jakarta Selatan".into(),
            postal_code: "12730".into(),
            notes: "Pagar hitam".into(),
            is_default: Some("on".into()),
        }
    }

    #[test]
    fn test_address_draft_normalizes_fields() {
        let draft = AddressDraft::parse(&input()).unwrap();
        assert_eq!(draft.label, "Home");
        assert_eq!(draft.recipient_name, "Ani Putri");
        assert_eq!(draft.phone.as_str(), "6281234567890");
        assert!(draft.is_default);
    }

    #[test]
    fn test_address_draft_reports_each_missing_field() {
        let bad = AddressInput {
            recipient_name: String::new(),
            street: " ".into(),
            phone: "12".into(),
            ..input()
        };
        let err = AddressDraft::parse(&bad).unwrap_err();
        let fields: Vec<&str> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["recipient_name", "street", "phone"]);
    }

    #[test]
    fn test_one_line_rendering() {
        let draft = AddressDraft::parse(&input()).unwrap();
        let address = Address {
            id: AddressId::new(1),
            user_id: UserId::generate(),
            label: draft.label,
            recipient_name: draft.recipient_name,
            phone: draft.phone.into(),
            street: draft.street,
            city: draft.city,
            postal_code: draft.postal_code,
            notes: draft.notes,
            is_default: true,
        };
        assert_eq!(
            address.one_line(),
            "Jl. Kemang Raya No. 10, Jakarta Selatan, 12730 (Pagar hitam)"
        );
    }

    #[test]
    fn test_profile_update_phone_is_optional() {
        let update = ProfileUpdate::parse("Budi", "").unwrap();
        assert_eq!(update.phone, None);
        assert!(ProfileUpdate::parse("Budi", "abc").is_err());
        assert!(ProfileUpdate::parse("   ", "").is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let profile = Profile {
            id: UserId::generate(),
            full_name: String::new(),
            email: Some("ani@kopi.id".into()),
            phone: None,
            role: ProfileRole::Customer,
            avatar_url: None,
            created_at: Utc::now(),
        };
        assert_eq!(profile.display_name(), "ani");
    }
}
