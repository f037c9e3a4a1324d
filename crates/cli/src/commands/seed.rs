//! Seed the menu from a YAML file.
//!
//! The whole file is checked with the same drafts the admin forms use
//! before anything is written, then applied in one transaction. Running
//! the same file twice changes nothing: categories match on slug, option
//! groups and products on name (case-insensitive), items on name within
//! their group.
//!
//! ```yaml
//! categories:
//!   - name: Coffee
//! option_groups:
//!   - name: Sugar level
//!     required: true
//!     items:
//!       - name: Less sugar
//!       - name: Extra shot
//!         extra_price: 5000
//! products:
//!   - name: Kopi Susu Gula Aren
//!     category: Coffee
//!     price: 25000
//!     stock: 40
//!     options: [Sugar level]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info};

use brewline_core::Money;
use brewline_core::catalog::{CategoryDraft, OptionGroupDraft, OptionItemDraft, ProductDraft};

use super::connect;

const fn yes() -> bool {
    true
}

const fn one() -> i32 {
    1
}

/// Top level of the menu file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub option_groups: Vec<OptionGroupSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "yes")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionGroupSeed {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "one")]
    pub max_select: i32,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub items: Vec<OptionItemSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionItemSeed {
    pub name: String,
    /// Whole rupiah.
    #[serde(default)]
    pub extra_price: u32,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductSeed {
    pub name: String,
    /// Category name, as listed under `categories`.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Whole rupiah.
    pub price: u32,
    #[serde(default)]
    pub discount_price: Option<u32>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "yes")]
    pub available: bool,
    #[serde(default)]
    pub featured: bool,
    /// Option group names, as listed under `option_groups`.
    #[serde(default)]
    pub options: Vec<String>,
}

/// A group and its items, validated.
#[derive(Debug)]
struct PlannedGroup {
    draft: OptionGroupDraft,
    items: Vec<OptionItemDraft>,
}

/// A validated product. Category and groups are resolved to ids while
/// seeding; the draft's own id fields stay empty.
#[derive(Debug)]
struct PlannedProduct {
    draft: ProductDraft,
    category_slug: Option<String>,
    group_keys: Vec<String>,
}

/// Everything in the file, checked and ready to write.
#[derive(Debug)]
struct MenuPlan {
    categories: Vec<CategoryDraft>,
    groups: Vec<PlannedGroup>,
    products: Vec<PlannedProduct>,
}

/// Rows written, split by whether they already existed.
#[derive(Debug, Default, PartialEq, Eq)]
struct SeedSummary {
    inserted: usize,
    updated: usize,
}

impl SeedSummary {
    const fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn category_slug(name: &str) -> String {
    CategoryDraft {
        name: name.to_owned(),
        sort_order: 0,
        is_active: true,
    }
    .slug()
}

/// Check the whole file, collecting every problem with enough context to
/// find it.
fn plan(file: MenuFile) -> Result<MenuPlan, Vec<String>> {
    let mut problems = Vec::new();

    let mut slugs = HashSet::new();
    let categories: Vec<CategoryDraft> = file
        .categories
        .into_iter()
        .map(|seed| CategoryDraft {
            name: seed.name.trim().to_owned(),
            sort_order: seed.sort_order,
            is_active: seed.active,
        })
        .collect();
    for draft in &categories {
        if let Err(invalid) = draft.validate() {
            problems.push(format!("category '{}': {invalid}", draft.name));
        } else if !slugs.insert(draft.slug()) {
            problems.push(format!("category '{}' is listed twice", draft.name));
        }
    }

    let mut group_names = HashSet::new();
    let mut groups = Vec::with_capacity(file.option_groups.len());
    for seed in file.option_groups {
        let draft = OptionGroupDraft {
            name: seed.name.trim().to_owned(),
            is_required: seed.required,
            max_select: seed.max_select,
            sort_order: seed.sort_order,
        };
        if let Err(invalid) = draft.validate() {
            problems.push(format!("option group '{}': {invalid}", draft.name));
        } else if !group_names.insert(name_key(&draft.name)) {
            problems.push(format!("option group '{}' is listed twice", draft.name));
        }

        let mut item_names = HashSet::new();
        let items: Vec<OptionItemDraft> = seed
            .items
            .into_iter()
            .map(|item| OptionItemDraft {
                name: item.name.trim().to_owned(),
                extra_price: Money::rupiah(item.extra_price),
                is_available: true,
                sort_order: item.sort_order,
            })
            .collect();
        for item in &items {
            if let Err(invalid) = item.validate() {
                problems.push(format!("option '{}' in '{}': {invalid}", item.name, draft.name));
            } else if !item_names.insert(name_key(&item.name)) {
                problems.push(format!(
                    "option '{}' is listed twice in '{}'",
                    item.name, draft.name
                ));
            }
        }
        groups.push(PlannedGroup { draft, items });
    }

    let mut product_names = HashSet::new();
    let mut products = Vec::with_capacity(file.products.len());
    for seed in file.products {
        let draft = ProductDraft {
            category_id: None,
            name: seed.name.trim().to_owned(),
            description: seed.description.trim().to_owned(),
            price: Money::rupiah(seed.price),
            discount_price: seed.discount_price.map(Money::rupiah),
            stock: seed.stock,
            is_available: seed.available,
            is_featured: seed.featured,
            option_group_ids: Vec::new(),
        };
        if let Err(invalid) = draft.validate() {
            problems.push(format!("product '{}': {invalid}", draft.name));
        } else if !product_names.insert(name_key(&draft.name)) {
            problems.push(format!("product '{}' is listed twice", draft.name));
        }

        let category_slug = seed.category.as_deref().map(category_slug);
        if let (Some(name), Some(slug)) = (&seed.category, &category_slug)
            && !slugs.contains(slug)
        {
            problems.push(format!(
                "product '{}': unknown category '{name}'",
                draft.name
            ));
        }

        let group_keys: Vec<String> = seed.options.iter().map(|g| name_key(g)).collect();
        for (name, key) in seed.options.iter().zip(&group_keys) {
            if !group_names.contains(key) {
                problems.push(format!(
                    "product '{}': unknown option group '{name}'",
                    draft.name
                ));
            }
        }

        products.push(PlannedProduct {
            draft,
            category_slug,
            group_keys,
        });
    }

    if problems.is_empty() {
        Ok(MenuPlan {
            categories,
            groups,
            products,
        })
    } else {
        Err(problems)
    }
}

async fn upsert_categories(
    tx: &mut Transaction<'_, Postgres>,
    categories: &[CategoryDraft],
    summary: &mut SeedSummary,
) -> Result<HashMap<String, i32>, sqlx::Error> {
    let mut ids = HashMap::with_capacity(categories.len());
    for draft in categories {
        // xmax is zero only on a freshly inserted row
        let (id, inserted): (i32, bool) = sqlx::query_as(
            r"
            INSERT INTO categories (name, slug, sort_order, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE
            SET name = EXCLUDED.name, sort_order = EXCLUDED.sort_order, is_active = EXCLUDED.is_active
            RETURNING id, (xmax = 0)
            ",
        )
        .bind(&draft.name)
        .bind(draft.slug())
        .bind(draft.sort_order)
        .bind(draft.is_active)
        .fetch_one(&mut **tx)
        .await?;
        summary.record(inserted);
        ids.insert(draft.slug(), id);
    }
    Ok(ids)
}

async fn upsert_groups(
    tx: &mut Transaction<'_, Postgres>,
    groups: &[PlannedGroup],
    summary: &mut SeedSummary,
) -> Result<HashMap<String, i32>, sqlx::Error> {
    let mut ids = HashMap::with_capacity(groups.len());
    for group in groups {
        let draft = &group.draft;
        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM option_groups WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
        )
        .bind(&draft.name)
        .fetch_optional(&mut **tx)
        .await?;

        let id = if let Some(id) = existing {
            sqlx::query(
                "UPDATE option_groups SET name = $2, is_required = $3, max_select = $4, sort_order = $5 WHERE id = $1",
            )
            .bind(id)
            .bind(&draft.name)
            .bind(draft.is_required)
            .bind(draft.max_select)
            .bind(draft.sort_order)
            .execute(&mut **tx)
            .await?;
            id
        } else {
            sqlx::query_scalar(
                r"
                INSERT INTO option_groups (name, is_required, max_select, sort_order)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(&draft.name)
            .bind(draft.is_required)
            .bind(draft.max_select)
            .bind(draft.sort_order)
            .fetch_one(&mut **tx)
            .await?
        };
        summary.record(existing.is_none());

        for item in &group.items {
            upsert_item(tx, id, item, summary).await?;
        }
        ids.insert(name_key(&draft.name), id);
    }
    Ok(ids)
}

async fn upsert_item(
    tx: &mut Transaction<'_, Postgres>,
    group_id: i32,
    item: &OptionItemDraft,
    summary: &mut SeedSummary,
) -> Result<(), sqlx::Error> {
    let updated = sqlx::query(
        r"
        UPDATE option_items
        SET name = $3, extra_price = $4, is_available = $5, sort_order = $6
        WHERE group_id = $1 AND LOWER(name) = LOWER($2)
        ",
    )
    .bind(group_id)
    .bind(&item.name)
    .bind(&item.name)
    .bind(item.extra_price)
    .bind(item.is_available)
    .bind(item.sort_order)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        sqlx::query(
            r"
            INSERT INTO option_items (group_id, name, extra_price, is_available, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(group_id)
        .bind(&item.name)
        .bind(item.extra_price)
        .bind(item.is_available)
        .bind(item.sort_order)
        .execute(&mut **tx)
        .await?;
    }
    summary.record(updated == 0);
    Ok(())
}

async fn upsert_product(
    tx: &mut Transaction<'_, Postgres>,
    product: &PlannedProduct,
    category_id: Option<i32>,
    group_ids: &[i32],
    summary: &mut SeedSummary,
) -> Result<(), sqlx::Error> {
    let draft = &product.draft;
    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM products WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
    )
    .bind(&draft.name)
    .fetch_optional(&mut **tx)
    .await?;

    let id: i32 = if let Some(id) = existing {
        sqlx::query(
            r"
            UPDATE products
            SET category_id = $2, name = $3, description = $4, price = $5,
                discount_price = $6, stock = $7, is_available = $8, is_featured = $9,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(category_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.discount_price)
        .bind(draft.stock)
        .bind(draft.is_available)
        .bind(draft.is_featured)
        .execute(&mut **tx)
        .await?;
        id
    } else {
        sqlx::query_scalar(
            r"
            INSERT INTO products
                (category_id, name, description, price, discount_price, stock, is_available, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(category_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.discount_price)
        .bind(draft.stock)
        .bind(draft.is_available)
        .bind(draft.is_featured)
        .fetch_one(&mut **tx)
        .await?
    };
    summary.record(existing.is_none());

    sqlx::query("DELETE FROM product_option_groups WHERE product_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r"
        INSERT INTO product_option_groups (product_id, group_id)
        SELECT $1, UNNEST($2::int[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(id)
    .bind(group_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Write the plan in one transaction.
async fn apply(pool: &PgPool, plan: &MenuPlan) -> Result<SeedSummary, sqlx::Error> {
    let mut summary = SeedSummary::default();
    let mut tx = pool.begin().await?;

    let category_ids = upsert_categories(&mut tx, &plan.categories, &mut summary).await?;
    let group_ids = upsert_groups(&mut tx, &plan.groups, &mut summary).await?;

    for product in &plan.products {
        let category_id = product
            .category_slug
            .as_ref()
            .and_then(|slug| category_ids.get(slug).copied());
        let groups: Vec<i32> = product
            .group_keys
            .iter()
            .filter_map(|key| group_ids.get(key).copied())
            .collect();
        upsert_product(&mut tx, product, category_id, &groups, &mut summary).await?;
    }

    tx.commit().await?;
    Ok(summary)
}

/// Seed the menu from `file_path`. With `check_only` the file is
/// validated and nothing is written.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or the database write fails (nothing is kept then).
pub async fn menu(file_path: &str, check_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading menu from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let file: MenuFile = serde_yaml::from_str(&content)?;

    let plan = match plan(file) {
        Ok(plan) => plan,
        Err(problems) => {
            error!("Menu validation failed:");
            for problem in &problems {
                error!("  - {problem}");
            }
            return Err(format!("{} validation errors found", problems.len()).into());
        }
    };

    info!(
        categories = plan.categories.len(),
        option_groups = plan.groups.len(),
        products = plan.products.len(),
        "Menu validated successfully"
    );
    if check_only {
        return Ok(());
    }

    let pool = connect().await?;
    let summary = apply(&pool, &plan).await?;

    info!("Seeding complete!");
    info!("  Rows inserted: {}", summary.inserted);
    info!("  Rows updated: {}", summary.updated);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const EXAMPLE: &str = include_str!("../../menu.example.yaml");

    fn parse(yaml: &str) -> MenuFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_example_menu_is_valid() {
        let plan = plan(parse(EXAMPLE)).unwrap();
        assert!(!plan.categories.is_empty());
        assert!(!plan.groups.is_empty());
        assert!(!plan.products.is_empty());
        assert!(plan.products.iter().all(|p| p.category_slug.is_some()));
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let plan = plan(parse(
            r"
categories:
  - name: Non Coffee
option_groups:
  - name: Ice
    items:
      - name: Less ice
products:
  - name: Matcha Latte
    category: non coffee
    price: 28000
    options: [ice]
",
        ))
        .unwrap();

        assert!(plan.categories[0].is_active);
        assert_eq!(plan.groups[0].draft.max_select, 1);
        assert!(!plan.groups[0].draft.is_required);
        assert!(plan.groups[0].items[0].extra_price.is_zero());
        let product = &plan.products[0];
        assert!(product.draft.is_available);
        assert_eq!(product.category_slug.as_deref(), Some("non-coffee"));
        assert_eq!(product.group_keys, ["ice"]);
    }

    #[test]
    fn test_reports_every_problem_with_context() {
        let problems = plan(parse(
            r"
categories:
  - name: Coffee
  - name: coffee
option_groups:
  - name: Size
    max_select: 0
products:
  - name: Americano
    category: Tea
    price: 20000
    discount_price: 25000
    options: [Milk]
",
        ))
        .unwrap_err();

        assert!(problems.contains(&"category 'coffee' is listed twice".to_owned()));
        assert!(problems.iter().any(|p| p.starts_with("option group 'Size'")));
        assert!(problems.iter().any(|p| p.contains("lower than the original price")));
        assert!(problems.contains(&"product 'Americano': unknown category 'Tea'".to_owned()));
        assert!(problems.contains(&"product 'Americano': unknown option group 'Milk'".to_owned()));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<MenuFile, _> = serde_yaml::from_str("products:\n  - name: X\n    price: 1\n    colour: red\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_counts_inserts_and_updates() {
        let mut summary = SeedSummary::default();
        summary.record(true);
        summary.record(false);
        summary.record(true);
        assert_eq!(
            summary,
            SeedSummary {
                inserted: 2,
                updated: 1
            }
        );
    }
}
