//! Store-wide settings edited from the back office.

use serde::{Deserialize, Serialize};

use crate::types::{Money, PhoneNumber};

/// Stored as a single JSON document; missing keys take their defaults so
/// older rows keep loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub store_name: String,
    /// Checkout is refused while closed.
    pub is_open: bool,
    pub delivery_enabled: bool,
    pub delivery_fee: Money,
    /// Master switch for customer WhatsApp updates.
    pub whatsapp_notifications: bool,
    /// Shop phone that receives a message for every new order.
    pub admin_whatsapp: Option<PhoneNumber>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Brewline Coffee".to_owned(),
            is_open: true,
            delivery_enabled: true,
            delivery_fee: Money::rupiah(10_000),
            whatsapp_notifications: false,
            admin_whatsapp: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let settings: StoreSettings =
            serde_json::from_str(r#"{"store_name":"Kopi Kenangan Senja","is_open":false}"#)
                .unwrap();
        assert_eq!(settings.store_name, "Kopi Kenangan Senja");
        assert!(!settings.is_open);
        assert!(settings.delivery_enabled);
        assert_eq!(settings.delivery_fee, Money::rupiah(10_000));
    }

    #[test]
    fn test_admin_phone_is_validated_on_load() {
        let settings: StoreSettings =
            serde_json::from_str(r#"{"admin_whatsapp":"0812-1111-2222"}"#).unwrap();
        assert_eq!(
            settings.admin_whatsapp.unwrap().as_str(),
            "6281211112222"
        );
        assert!(serde_json::from_str::<StoreSettings>(r#"{"admin_whatsapp":"x"}"#).is_err());
    }
}
