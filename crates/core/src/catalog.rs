//! Menu catalog: categories, products and their option groups.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::order::OrderLineOption;
use crate::types::{CategoryId, Money, OptionGroupId, OptionItemId, ProductId};
use crate::validation::{ValidationError, char_len};

/// A menu section such as "Coffee" or "Pastry".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub sort_order: i32,
    pub is_active: bool,
}

/// A sellable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub is_available: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Discount price when a valid one is set, otherwise the list price.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        match self.discount_price {
            Some(discount) if discount < self.price => discount,
            _ => self.price,
        }
    }

    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.effective_price() < self.price
    }

    /// Whole-percent saving, rounded down. Zero without a discount.
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        if !self.has_discount() || self.price.is_zero() {
            return 0;
        }
        let saved = self.price.amount() - self.effective_price().amount();
        (saved * Decimal::ONE_HUNDRED / self.price.amount())
            .floor()
            .to_u32()
            .unwrap_or(0)
    }

    /// Listed, switched on and with stock left.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.is_available && self.stock > 0
    }
}

/// A configurable choice attached to products, e.g. "Sugar level".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OptionGroup {
    pub id: OptionGroupId,
    pub name: String,
    pub is_required: bool,
    pub max_select: i32,
    pub sort_order: i32,
}

/// One pick within an option group, e.g. "Less sugar" or "Extra shot".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OptionItem {
    pub id: OptionItemId,
    pub group_id: OptionGroupId,
    pub name: String,
    pub extra_price: Money,
    pub is_available: bool,
    pub sort_order: i32,
}

/// A group with its items, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroupWithItems {
    pub group: OptionGroup,
    pub items: Vec<OptionItem>,
}

impl OptionGroupWithItems {
    /// Radio buttons when one pick is allowed, checkboxes otherwise.
    #[must_use]
    pub const fn is_single_choice(&self) -> bool {
        self.group.max_select <= 1
    }
}

/// Why a set of chosen options was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("option {0} is not offered for this item")]
    UnknownOption(OptionItemId),
    #[error("{0} is currently unavailable")]
    Unavailable(String),
    #[error("please choose a {0}")]
    MissingRequired(String),
    #[error("choose at most {max} for {group}")]
    TooMany { group: String, max: i32 },
}

/// Check the chosen option items against a product's groups and snapshot
/// them for the order.
///
/// # Errors
///
/// Returns the first [`SelectionError`] found: an item outside the product's
/// groups, an unavailable item, a required group left empty, or a group with
/// more picks than `max_select`.
pub fn validate_selection(
    groups: &[OptionGroupWithItems],
    chosen: &[OptionItemId],
) -> Result<Vec<OrderLineOption>, SelectionError> {
    for id in chosen {
        let known = groups
            .iter()
            .any(|g| g.items.iter().any(|item| item.id == *id));
        if !known {
            return Err(SelectionError::UnknownOption(*id));
        }
    }

    let mut picked = Vec::new();
    for entry in groups {
        let in_group: Vec<&OptionItem> = entry
            .items
            .iter()
            .filter(|item| chosen.contains(&item.id))
            .collect();

        if let Some(item) = in_group.iter().find(|item| !item.is_available) {
            return Err(SelectionError::Unavailable(item.name.clone()));
        }
        if entry.group.is_required && in_group.is_empty() {
            return Err(SelectionError::MissingRequired(entry.group.name.clone()));
        }
        if i32::try_from(in_group.len()).unwrap_or(i32::MAX) > entry.group.max_select {
            return Err(SelectionError::TooMany {
                group: entry.group.name.clone(),
                max: entry.group.max_select,
            });
        }

        picked.extend(in_group.into_iter().map(|item| OrderLineOption {
            group: entry.group.name.clone(),
            name: item.name.clone(),
            extra_price: item.extra_price,
        }));
    }

    Ok(picked)
}

/// URL slug from a display name: lower-case ASCII words joined by `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Submitted product form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub stock: i32,
    pub is_available: bool,
    pub is_featured: bool,
    pub option_group_ids: Vec<OptionGroupId>,
}

impl ProductDraft {
    pub const MAX_NAME: usize = 120;
    pub const MAX_DESCRIPTION: usize = 1000;

    /// # Errors
    ///
    /// Returns every failed field: missing or long name, non-positive
    /// price, a discount that is not strictly below the price, or negative
    /// stock.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        let name_len = char_len(&self.name);
        errors.check(name_len > 0, "name", "Name is required");
        errors.check(
            name_len <= Self::MAX_NAME,
            "name",
            format!("Name must be at most {} characters", Self::MAX_NAME),
        );
        errors.check(
            char_len(&self.description) <= Self::MAX_DESCRIPTION,
            "description",
            format!(
                "Description must be at most {} characters",
                Self::MAX_DESCRIPTION
            ),
        );
        errors.check(
            !self.price.is_zero(),
            "price",
            "Price must be greater than zero",
        );
        if let Some(discount) = self.discount_price {
            errors.check(
                !discount.is_zero(),
                "discount_price",
                "Discount price must be greater than zero",
            );
            errors.check(
                discount < self.price,
                "discount_price",
                "Discount price must be lower than the original price",
            );
        }
        errors.check(self.stock >= 0, "stock", "Stock cannot be negative");
        errors.finish()
    }
}

/// Submitted category form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
}

impl CategoryDraft {
    pub const MAX_NAME: usize = 60;

    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// # Errors
    ///
    /// Returns an error when the name is empty, too long or has no
    /// characters usable in a slug.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        let len = char_len(&self.name);
        errors.check(len > 0, "name", "Name is required");
        errors.check(
            len <= Self::MAX_NAME,
            "name",
            format!("Name must be at most {} characters", Self::MAX_NAME),
        );
        if len > 0 {
            errors.check(
                !self.slug().is_empty(),
                "name",
                "Name needs at least one letter or digit",
            );
        }
        errors.finish()
    }
}

/// Submitted option group form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroupDraft {
    pub name: String,
    pub is_required: bool,
    pub max_select: i32,
    pub sort_order: i32,
}

impl OptionGroupDraft {
    /// # Errors
    ///
    /// Returns an error for an empty name or a `max_select` below one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        errors.check(char_len(&self.name) > 0, "name", "Name is required");
        errors.check(
            self.max_select >= 1,
            "max_select",
            "Allow at least one choice",
        );
        errors.finish()
    }
}

/// Submitted option item form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItemDraft {
    pub name: String,
    pub extra_price: Money,
    pub is_available: bool,
    pub sort_order: i32,
}

impl OptionItemDraft {
    /// Extra prices are `Money`, so they are never negative.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        errors.check(char_len(&self.name) > 0, "name", "Name is required");
        errors.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    pub fn product(id: i32, price: u32, discount: Option<u32>) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: Some(CategoryId::new(1)),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::rupiah(price),
            discount_price: discount.map(Money::rupiah),
            image_url: None,
            stock: 10,
            is_available: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn sugar_and_toppings() -> Vec<OptionGroupWithItems> {
        let item = |id: i32, group: i32, name: &str, extra: u32, available: bool| OptionItem {
            id: OptionItemId::new(id),
            group_id: OptionGroupId::new(group),
            name: name.to_owned(),
            extra_price: Money::rupiah(extra),
            is_available: available,
            sort_order: id,
        };
        vec![
            OptionGroupWithItems {
                group: OptionGroup {
                    id: OptionGroupId::new(1),
                    name: "Sugar level".into(),
                    is_required: true,
                    max_select: 1,
                    sort_order: 0,
                },
                items: vec![
                    item(1, 1, "Normal sugar", 0, true),
                    item(2, 1, "Less sugar", 0, true),
                ],
            },
            OptionGroupWithItems {
                group: OptionGroup {
                    id: OptionGroupId::new(2),
                    name: "Toppings".into(),
                    is_required: false,
                    max_select: 2,
                    sort_order: 1,
                },
                items: vec![
                    item(3, 2, "Boba", 5_000, true),
                    item(4, 2, "Grass jelly", 4_000, true),
                    item(5, 2, "Cheese foam", 7_000, false),
                    item(6, 2, "Oat milk", 8_000, true),
                ],
            },
        ]
    }

    fn ids(raw: &[i32]) -> Vec<OptionItemId> {
        raw.iter().copied().map(OptionItemId::new).collect()
    }

    #[test]
    fn test_effective_price_prefers_valid_discount() {
        assert_eq!(product(1, 25_000, None).effective_price(), Money::rupiah(25_000));
        assert_eq!(
            product(1, 25_000, Some(20_000)).effective_price(),
            Money::rupiah(20_000)
        );
        // A stale discount at or above the price is ignored.
        assert_eq!(
            product(1, 25_000, Some(30_000)).effective_price(),
            Money::rupiah(25_000)
        );
        assert!(!product(1, 25_000, Some(25_000)).has_discount());
    }

    #[test]
    fn test_discount_percent_rounds_down() {
        assert_eq!(product(1, 30_000, Some(20_000)).discount_percent(), 33);
        assert_eq!(product(1, 30_000, None).discount_percent(), 0);
    }

    #[test]
    fn test_orderable_needs_stock_and_availability() {
        let mut p = product(1, 10_000, None);
        assert!(p.is_orderable());
        p.stock = 0;
        assert!(!p.is_orderable());
        p.stock = 5;
        p.is_available = false;
        assert!(!p.is_orderable());
    }

    #[test]
    fn test_selection_snapshots_chosen_options() {
        let picked = validate_selection(&sugar_and_toppings(), &ids(&[2, 3, 4])).unwrap();
        let names: Vec<&str> = picked.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Less sugar", "Boba", "Grass jelly"]);
        assert_eq!(picked[1].group, "Toppings");
        assert_eq!(picked[1].extra_price, Money::rupiah(5_000));
    }

    #[test]
    fn test_selection_requires_required_groups() {
        assert_eq!(
            validate_selection(&sugar_and_toppings(), &ids(&[3])),
            Err(SelectionError::MissingRequired("Sugar level".into()))
        );
    }

    #[test]
    fn test_selection_enforces_max_select() {
        assert_eq!(
            validate_selection(&sugar_and_toppings(), &ids(&[1, 3, 4, 6])),
            Err(SelectionError::TooMany {
                group: "Toppings".into(),
                max: 2
            })
        );
        assert!(matches!(
            validate_selection(&sugar_and_toppings(), &ids(&[1, 2])),
            Err(SelectionError::TooMany { .. })
        ));
    }

    #[test]
    fn test_selection_rejects_unknown_and_unavailable() {
        assert_eq!(
            validate_selection(&sugar_and_toppings(), &ids(&[1, 99])),
            Err(SelectionError::UnknownOption(OptionItemId::new(99)))
        );
        assert_eq!(
            validate_selection(&sugar_and_toppings(), &ids(&[1, 5])),
            Err(SelectionError::Unavailable("Cheese foam".into()))
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Kopi Susu"), "kopi-susu");
        assert_eq!(slugify("  Non-Coffee & Tea!! "), "non-coffee-tea");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("☕"), "");
    }

    fn draft() -> ProductDraft {
        ProductDraft {
            category_id: None,
            name: "Es Kopi Susu".into(),
            description: "House blend with palm sugar".into(),
            price: Money::rupiah(25_000),
            discount_price: None,
            stock: 20,
            is_available: true,
            is_featured: false,
            option_group_ids: vec![],
        }
    }

    #[test]
    fn test_product_draft_accepts_valid_input() {
        assert!(draft().validate().is_ok());
        let discounted = ProductDraft {
            discount_price: Some(Money::rupiah(20_000)),
            ..draft()
        };
        assert!(discounted.validate().is_ok());
    }

    #[test]
    fn test_product_draft_rejects_discount_not_below_price() {
        for discount in [25_000, 30_000] {
            let d = ProductDraft {
                discount_price: Some(Money::rupiah(discount)),
                ..draft()
            };
            let err = d.validate().unwrap_err();
            assert_eq!(
                err.message_for("discount_price"),
                Some("Discount price must be lower than the original price")
            );
        }
    }

    #[test]
    fn test_product_draft_collects_all_errors() {
        let d = ProductDraft {
            name: "  ".into(),
            price: Money::ZERO,
            stock: -1,
            ..draft()
        };
        let err = d.validate().unwrap_err();
        let fields: Vec<&str> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["name", "price", "stock"]);
    }

    #[test]
    fn test_category_and_option_drafts() {
        let category = CategoryDraft {
            name: "Signature Drinks".into(),
            sort_order: 0,
            is_active: true,
        };
        assert_eq!(category.slug(), "signature-drinks");
        assert!(category.validate().is_ok());
        assert!(
            CategoryDraft {
                name: "!!!".into(),
                ..category
            }
            .validate()
            .is_err()
        );

        let group = OptionGroupDraft {
            name: "Ice level".into(),
            is_required: true,
            max_select: 0,
            sort_order: 0,
        };
        assert_eq!(
            group.validate().unwrap_err().message_for("max_select"),
            Some("Allow at least one choice")
        );
    }
}
