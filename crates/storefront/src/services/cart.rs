//! Session cart storage and pricing against the live catalog.

use std::collections::HashMap;

use sqlx::PgPool;
use tower_sessions::Session;
use tracing::debug;

use brewline_core::cart::Cart;
use brewline_core::catalog::{OptionGroupWithItems, Product, validate_selection};
use brewline_core::pricing::{PricedLine, price_line};
use brewline_core::{Money, ProductId};
use brewline_platform::db::RepositoryError;

use crate::db::MenuRepository;
use crate::models::session_keys;

/// The session cart, empty when none is stored.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

/// Shown in place of a product name when the product was deleted.
pub const DELETED_ITEM: &str = "An item that is no longer on the menu";

/// One priced line plus what the cart page needs to address it.
#[derive(Debug, Clone)]
pub struct CartEntry {
    pub key: String,
    pub line: PricedLine,
    pub image_url: Option<String>,
    /// Stock left, to cap the quantity input.
    pub stock: i32,
}

/// The cart resolved against current prices and availability.
#[derive(Debug, Clone, Default)]
pub struct PricedCart {
    pub entries: Vec<CartEntry>,
    /// Names of products dropped because they are gone, unavailable or
    /// their chosen options no longer fit.
    pub removed: Vec<String>,
}

impl PricedCart {
    #[must_use]
    pub fn lines(&self) -> Vec<PricedLine> {
        self.entries.iter().map(|e| e.line.clone()).collect()
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.entries.iter().map(|e| e.line.line_total).sum()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Price every line of `cart` with fresh catalog data. Lines that can no
/// longer be ordered are removed from `cart` and listed in
/// [`PricedCart::removed`]; the caller saves the cart when that list is
/// not empty.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a catalog query fails.
pub async fn price_cart(pool: &PgPool, cart: &mut Cart) -> Result<PricedCart, RepositoryError> {
    let mut ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let repo = MenuRepository::new(pool);
    let products: HashMap<ProductId, Product> = repo
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let groups = repo.option_groups_for_products(&ids).await?;

    Ok(price_with(cart, &products, &groups))
}

fn price_with(
    cart: &mut Cart,
    products: &HashMap<ProductId, Product>,
    groups: &HashMap<ProductId, Vec<OptionGroupWithItems>>,
) -> PricedCart {
    let mut priced = PricedCart::default();
    let mut dead_keys = Vec::new();

    for line in cart.lines() {
        let key = line.key();
        let Some(product) = products.get(&line.product_id).filter(|p| p.is_orderable()) else {
            let name = products
                .get(&line.product_id)
                .map_or(DELETED_ITEM, |p| p.name.as_str());
            priced.removed.push(name.to_owned());
            dead_keys.push(key);
            continue;
        };

        let product_groups = groups.get(&product.id).map_or(&[][..], Vec::as_slice);
        match validate_selection(product_groups, &line.option_item_ids) {
            Ok(options) => priced.entries.push(CartEntry {
                key,
                line: price_line(product, options, line.quantity, line.note.clone()),
                image_url: product.image_url.clone(),
                stock: product.stock,
            }),
            Err(e) => {
                debug!(product_id = %product.id, error = %e, "Dropping cart line with stale options");
                priced.removed.push(product.name.clone());
                dead_keys.push(key);
            }
        }
    }

    for key in &dead_keys {
        cart.remove(key);
    }
    priced
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use brewline_core::cart::CartLine;
    use brewline_core::catalog::{OptionGroup, OptionItem};
    use brewline_core::{OptionGroupId, OptionItemId};

    fn product(id: i32, price: u32, stock: i32) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: None,
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::rupiah(price),
            discount_price: None,
            image_url: None,
            stock,
            is_available: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sugar_group() -> OptionGroupWithItems {
        OptionGroupWithItems {
            group: OptionGroup {
                id: OptionGroupId::new(1),
                name: "Sugar".into(),
                is_required: true,
                max_select: 1,
                sort_order: 0,
            },
            items: vec![OptionItem {
                id: OptionItemId::new(10),
                group_id: OptionGroupId::new(1),
                name: "Less sugar".into(),
                extra_price: Money::ZERO,
                is_available: true,
                sort_order: 0,
            }],
        }
    }

    #[test]
    fn test_prices_valid_lines_and_drops_the_rest() {
        let mut cart = Cart::default();
        cart.add(CartLine::new(ProductId::new(1), vec![OptionItemId::new(10)], 2, None));
        // required sugar level missing
        cart.add(CartLine::new(ProductId::new(1), vec![], 1, Some("hot".into())));
        // sold out
        cart.add(CartLine::new(ProductId::new(2), vec![], 1, None));
        // deleted from the catalog
        cart.add(CartLine::new(ProductId::new(3), vec![], 1, None));

        let products = HashMap::from([
            (ProductId::new(1), product(1, 18_000, 5)),
            (ProductId::new(2), product(2, 15_000, 0)),
        ]);
        let groups = HashMap::from([(ProductId::new(1), vec![sugar_group()])]);

        let priced = price_with(&mut cart, &products, &groups);

        assert_eq!(priced.entries.len(), 1);
        assert_eq!(priced.subtotal(), Money::rupiah(36_000));
        assert_eq!(priced.removed, ["Product 1", "Product 2", DELETED_ITEM]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_deleted_product_is_reported_and_leaves_the_cart() {
        let mut cart = Cart::default();
        cart.add(CartLine::new(ProductId::new(1), vec![], 1, None));
        cart.add(CartLine::new(ProductId::new(3), vec![], 4, None));

        let products = HashMap::from([(ProductId::new(1), product(1, 18_000, 5))]);

        let priced = price_with(&mut cart, &products, &HashMap::new());

        assert_eq!(priced.entries.len(), 1);
        // non-empty so checkout refuses and the route saves the cart
        assert_eq!(priced.removed, [DELETED_ITEM]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 1);
    }
}
