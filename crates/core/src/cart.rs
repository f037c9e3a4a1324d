//! Session-backed shopping cart.
//!
//! The cart only stores references (product, chosen option items, quantity,
//! note). Prices are resolved against the live catalog every time the cart
//! is shown or checked out.

use serde::{Deserialize, Serialize};

use crate::types::{OptionItemId, ProductId};

/// One cart line before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub option_item_ids: Vec<OptionItemId>,
    pub quantity: u32,
    pub note: Option<String>,
}

impl CartLine {
    /// Build a line with options sorted and de-duplicated and a blank note
    /// dropped, so identical picks always merge.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        mut option_item_ids: Vec<OptionItemId>,
        quantity: u32,
        note: Option<String>,
    ) -> Self {
        option_item_ids.sort_unstable();
        option_item_ids.dedup();
        let note = note
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        Self {
            product_id,
            option_item_ids,
            quantity: quantity.clamp(1, Cart::MAX_LINE_QUANTITY),
            note,
        }
    }

    /// Stable identifier used by cart forms, e.g. `p12-o3.7-n0`.
    #[must_use]
    pub fn key(&self) -> String {
        let options = self
            .option_item_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        let note = self.note.as_deref().map_or(0, fnv1a);
        format!("p{}-o{options}-n{note:x}", self.product_id)
    }

    fn same_choice(&self, other: &Self) -> bool {
        self.product_id == other.product_id
            && self.option_item_ids == other.option_item_ids
            && self.note == other.note
    }
}

/// 32-bit FNV-1a; keys must survive restarts so `DefaultHasher` won't do.
fn fnv1a(s: &str) -> u32 {
    s.bytes().fold(0x811c_9dc5, |hash, b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub const MAX_LINE_QUANTITY: u32 = 99;

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of cups and items, for the header badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Add a line, merging into an identical one if present. Returns the
    /// key of the affected line.
    pub fn add(&mut self, line: CartLine) -> String {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.same_choice(&line)) {
            existing.quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(Self::MAX_LINE_QUANTITY);
            return existing.key();
        }
        let key = line.key();
        self.lines.push(line);
        key
    }

    /// Set a line's quantity; zero removes it. Returns `false` for an
    /// unknown key.
    pub fn set_quantity(&mut self, key: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(key);
        }
        match self.lines.iter_mut().find(|l| l.key() == key) {
            Some(line) => {
                line.quantity = quantity.min(Self::MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.key() != key);
        self.lines.len() != before
    }

    /// Drop lines for products that no longer exist. Returns how many went.
    pub fn retain_products(&mut self, exists: impl Fn(ProductId) -> bool) -> usize {
        let before = self.lines.len();
        self.lines.retain(|l| exists(l.product_id));
        before - self.lines.len()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn line(product: i32, options: &[i32], qty: u32, note: Option<&str>) -> CartLine {
        CartLine::new(
            ProductId::new(product),
            options.iter().copied().map(OptionItemId::new).collect(),
            qty,
            note.map(str::to_owned),
        )
    }

    #[test]
    fn test_identical_choices_merge() {
        let mut cart = Cart::default();
        let a = cart.add(line(1, &[3, 1], 1, None));
        let b = cart.add(line(1, &[1, 3, 3], 2, Some("  ")));
        assert_eq!(a, b);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_different_options_or_notes_stay_separate() {
        let mut cart = Cart::default();
        cart.add(line(1, &[1], 1, None));
        cart.add(line(1, &[2], 1, None));
        cart.add(line(1, &[1], 1, Some("no ice")));
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_quantity_is_capped() {
        let mut cart = Cart::default();
        cart.add(line(1, &[], 60, None));
        let key = cart.add(line(1, &[], 60, None));
        assert_eq!(cart.lines()[0].quantity, Cart::MAX_LINE_QUANTITY);
        assert!(cart.set_quantity(&key, 500));
        assert_eq!(cart.lines()[0].quantity, Cart::MAX_LINE_QUANTITY);
        assert_eq!(line(2, &[], 0, None).quantity, 1);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::default();
        let key = cart.add(line(1, &[], 2, None));
        assert!(cart.set_quantity(&key, 0));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(&key, 1));
    }

    #[test]
    fn test_key_is_stable_and_readable() {
        let l = line(12, &[7, 3], 1, None);
        assert_eq!(l.key(), "p12-o3.7-n0");
        let noted = line(12, &[], 1, Some("less ice"));
        assert_eq!(noted.key(), line(12, &[], 4, Some("less ice ")).key());
    }

    #[test]
    fn test_retain_products_drops_missing() {
        let mut cart = Cart::default();
        cart.add(line(1, &[], 1, None));
        cart.add(line(2, &[], 1, None));
        let removed = cart.retain_products(|id| id == ProductId::new(2));
        assert_eq!(removed, 1);
        assert_eq!(cart.lines()[0].product_id, ProductId::new(2));
    }

    #[test]
    fn test_cart_survives_session_serialization() {
        let mut cart = Cart::default();
        cart.add(line(5, &[2], 2, Some("extra hot")));
        let json = serde_json::to_value(&cart).unwrap();
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
