//! Promo banners shown on the storefront home page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, PromoId};
use crate::validation::{ValidationError, char_len};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Promo {
    pub id: PromoId,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    /// Tapping the banner opens this product, if set.
    pub product_id: Option<ProductId>,
    pub is_active: bool,
    pub sort_order: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Promo {
    /// Active and inside its (optional) schedule window.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|start| start <= now)
            && self.ends_at.is_none_or(|end| now < end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoDraft {
    pub title: String,
    pub subtitle: Option<String>,
    pub product_id: Option<ProductId>,
    pub is_active: bool,
    pub sort_order: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl PromoDraft {
    pub const MAX_TITLE: usize = 80;

    /// # Errors
    ///
    /// Returns an error for a missing or long title, or a schedule that
    /// ends before it starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        let len = char_len(&self.title);
        errors.check(len > 0, "title", "Title is required");
        errors.check(
            len <= Self::MAX_TITLE,
            "title",
            format!("Title must be at most {} characters", Self::MAX_TITLE),
        );
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            errors.check(end > start, "ends_at", "End must be after the start");
        }
        errors.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn promo() -> Promo {
        Promo {
            id: PromoId::new(1),
            title: "Buy 1 Get 1 Kopi Susu".into(),
            subtitle: None,
            image_url: None,
            product_id: Some(ProductId::new(3)),
            is_active: true,
            sort_order: 0,
            starts_at: None,
            ends_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unscheduled_active_promo_is_live() {
        assert!(promo().is_live(Utc::now()));
        let inactive = Promo {
            is_active: false,
            ..promo()
        };
        assert!(!inactive.is_live(Utc::now()));
    }

    #[test]
    fn test_schedule_window_is_half_open() {
        let now = Utc::now();
        let p = Promo {
            starts_at: Some(now),
            ends_at: Some(now + Duration::days(1)),
            ..promo()
        };
        assert!(p.is_live(now));
        assert!(!p.is_live(now - Duration::seconds(1)));
        assert!(!p.is_live(now + Duration::days(1)));
    }

    #[test]
    fn test_draft_rejects_inverted_schedule() {
        let now = Utc::now();
        let draft = PromoDraft {
            title: "Weekend".into(),
            subtitle: None,
            product_id: None,
            is_active: true,
            sort_order: 0,
            starts_at: Some(now),
            ends_at: Some(now - Duration::hours(1)),
        };
        let err = draft.validate().unwrap_err();
        assert_eq!(err.message_for("ends_at"), Some("End must be after the start"));
    }
}
