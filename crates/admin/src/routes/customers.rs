//! Customer directory route handlers.

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use brewline_core::UserId;
use brewline_core::messages::Flash;
use brewline_core::profile::Address;

use super::dashboard::AdminUserView;
use crate::db::customers::CustomerSummary;
use crate::db::{CustomerRepository, OrderRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireStaff, take_flash};
use crate::state::AppState;
use crate::views::{OrderRow, format_datetime, render};

const PER_PAGE: i64 = 20;

/// Orders shown on a customer page.
const ORDER_HISTORY_LIMIT: i64 = 50;

/// Query parameters for the customer list. `page` is one-based.
#[derive(Debug, Default, Deserialize)]
pub struct CustomersQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

impl CustomersQuery {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Customer row for templates.
#[derive(Debug, Clone)]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub order_count: i64,
    pub total_spent: String,
    pub last_order_at: Option<String>,
    pub joined_at: String,
}

impl From<&CustomerSummary> for CustomerView {
    fn from(summary: &CustomerSummary) -> Self {
        let profile = &summary.profile;
        Self {
            id: profile.id.to_string(),
            name: profile.display_name().to_owned(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            role: profile.role.to_string(),
            order_count: summary.order_count,
            total_spent: summary.total_spent.format(),
            last_order_at: summary.last_order_at.map(format_datetime),
            joined_at: format_datetime(profile.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddressView {
    pub label: String,
    pub recipient: String,
    pub phone: String,
    pub line: String,
    pub is_default: bool,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        Self {
            label: address.label.clone(),
            recipient: address.recipient_name.clone(),
            phone: address.phone.clone(),
            line: address.one_line(),
            is_default: address.is_default,
        }
    }
}

/// Previous/next links for a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub total_pages: i64,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

impl Pagination {
    fn new(page: i64, total: i64, per_page: i64) -> Self {
        let total_pages = ((total + per_page - 1) / per_page).max(1);
        Self {
            page,
            total_pages,
            prev_page: (page > 1).then(|| page - 1),
            next_page: (page < total_pages).then(|| page + 1),
        }
    }
}

/// Customers list page template.
#[derive(Template)]
#[template(path = "customers/index.html")]
pub struct CustomersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub customers: Vec<CustomerView>,
    pub total: i64,
    pub pagination: Pagination,
    pub search_query: String,
}

/// Customer detail page template.
#[derive(Template)]
#[template(path = "customers/show.html")]
pub struct CustomerShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
    pub customer: CustomerView,
    pub avatar_url: Option<String>,
    pub addresses: Vec<AddressView>,
    pub orders: Vec<OrderRow>,
}

/// Customers list page handler.
#[instrument(skip(staff, state, session))]
pub async fn index(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CustomersQuery>,
) -> Result<Html<String>, AppError> {
    let page = query.page();
    let result = CustomerRepository::new(state.pool())
        .search(query.search(), page - 1, PER_PAGE)
        .await?;

    let template = CustomersIndexTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/customers".to_string(),
        flashes: take_flash(&session).await,
        customers: result.customers.iter().map(CustomerView::from).collect(),
        total: result.total,
        pagination: Pagination::new(page, result.total, PER_PAGE),
        search_query: query.search().unwrap_or_default().to_owned(),
    };
    Ok(render(&template))
}

/// Customer detail page handler.
#[instrument(skip(staff, state, session))]
pub async fn show(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id: UserId = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("customer {id}")))?;
    let customers = CustomerRepository::new(state.pool());
    let summary = customers.get(id).await?;
    let orders_repo = OrderRepository::new(state.pool());
    let (addresses, orders) = tokio::join!(
        customers.addresses(id),
        orders_repo.list_for_user(id, ORDER_HISTORY_LIMIT),
    );

    let template = CustomerShowTemplate {
        admin_user: AdminUserView::from(&staff),
        current_path: "/customers".to_string(),
        flashes: take_flash(&session).await,
        customer: CustomerView::from(&summary),
        avatar_url: summary.profile.avatar_url.clone(),
        addresses: addresses?.iter().map(AddressView::from).collect(),
        orders: orders?.iter().map(OrderRow::from).collect(),
    };
    Ok(render(&template))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_is_one_based_and_clamped() {
        let query = CustomersQuery {
            q: Some("  ".to_owned()),
            page: Some(0),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.search(), None);
        assert_eq!(CustomersQuery::default().page(), 1);
    }

    #[test]
    fn test_pagination_links() {
        let first = Pagination::new(1, 45, PER_PAGE);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.prev_page, None);
        assert_eq!(first.next_page, Some(2));

        let last = Pagination::new(3, 45, PER_PAGE);
        assert_eq!(last.prev_page, Some(2));
        assert_eq!(last.next_page, None);

        let empty = Pagination::new(1, 0, PER_PAGE);
        assert_eq!(empty.total_pages, 1);
        assert_eq!(empty.next_page, None);
    }
}
