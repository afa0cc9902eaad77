use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_catalog::FoodDetails;
use trattoria_infra::CartLine;
use trattoria_orders::{Fulfillment, OrderContact};

use crate::app::errors::ApiResult;

pub const DEFAULT_PER_PAGE: u32 = 12;
pub const MAX_PER_PAGE: u32 = 100;

// -------------------------
// Pagination
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub total_pages: u32,
}

/// Slice `items` into one page. `page` starts at 1; `per_page` is capped.
pub fn paginate<T>(items: Vec<T>, page: Option<u32>, per_page: Option<u32>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let total = items.len();
    let total_pages = total.div_ceil(per_page as usize) as u32;

    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let items = items.into_iter().skip(start).take(per_page as usize).collect();
    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

/// `delivery` unless the client says otherwise.
pub fn parse_fulfillment(raw: Option<&str>) -> ApiResult<Fulfillment> {
    match raw {
        None => Ok(Fulfillment::Delivery),
        Some(s) => Ok(Fulfillment::parse(s)?),
    }
}

// -------------------------
// Auth / account
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub default_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize)]
pub struct FoodRequest {
    pub sku: String,
    #[serde(flatten)]
    pub details: FoodDetails,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub stock: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// `quantity: null` stops tracking stock.
#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub quantity: Option<u32>,
}

/// Storefront menu filters. Prices are in cents.
#[derive(Debug, Default, Deserialize)]
pub struct FoodListQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

// -------------------------
// Cart / orders
// -------------------------

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub fulfillment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub contact: OrderContact,
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub fulfillment: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Guests prove ownership of a tracked order with the phone they ordered with.
#[derive(Debug, Deserialize)]
pub struct TrackingCancelRequest {
    pub phone: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrdersQuery {
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

// -------------------------
// Reservations / contact / blog / users
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub party_size: u32,
    pub reserved_for: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub unread: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogQuery {
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    #[serde(flatten)]
    pub body: trattoria_blog::PostContent,
    /// Publish immediately after creating.
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub range: Option<String>,
}
