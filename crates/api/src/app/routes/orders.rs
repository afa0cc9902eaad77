use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tokio_stream::Stream;

use trattoria_auth::permissions as perm;
use trattoria_core::validate;
use trattoria_infra::projections::{OrderQuery, OrderView};
use trattoria_infra::{CheckoutRequest, quote};
use trattoria_orders::{
    Fulfillment, OrderId, OrderLine, OrderStatus, OrderTotals, PaymentMethod, StatusChange, TrackingCode,
};

use crate::app::dto::{self, Page, paginate, parse_fulfillment};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::{self, AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/cart/quote", post(quote_cart))
        .route("/orders/track/:code", get(track_order))
        .route("/orders/track/:code/stream", get(track_order_stream))
        .route("/orders/track/:code/cancel", post(cancel_tracked_order))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id", get(admin_get_order))
        .route("/:id/status", post(admin_change_status))
}

/// What anyone holding the tracking code may see.
#[derive(Debug, Serialize)]
pub struct TrackedOrder {
    pub tracking_code: TrackingCode,
    pub status: OrderStatus,
    pub fulfillment: Fulfillment,
    pub customer_name: String,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub history: Vec<StatusChange>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderView> for TrackedOrder {
    fn from(view: OrderView) -> Self {
        Self {
            tracking_code: view.tracking_code,
            status: view.status,
            fulfillment: view.fulfillment,
            customer_name: view.contact.name,
            lines: view.lines,
            totals: view.totals,
            history: view.history,
            placed_at: view.placed_at,
            updated_at: view.updated_at,
        }
    }
}

// -------------------------
// Storefront
// -------------------------

pub async fn quote_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::QuoteRequest>,
) -> ApiResult<Json<JsonValue>> {
    let fulfillment = parse_fulfillment(body.fulfillment.as_deref())?;
    let priced = quote(&services.read_models.foods, &body.lines, fulfillment, &services.config.delivery)?;
    Ok(Json(json!({
        "currency": services.config.currency,
        "fulfillment": fulfillment,
        "lines": priced.lines,
        "totals": priced.totals,
    })))
}

/// Guest or registered checkout. A valid bearer token links the order to
/// the caller's account.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let fulfillment = parse_fulfillment(body.fulfillment.as_deref())?;
    let payment_method = PaymentMethod::parse(body.payment_method.as_deref().unwrap_or_default())?;

    let mut contact = body.contact;
    let customer_id = principal.map(|Extension(p)| {
        if contact.email.as_deref().is_none_or(|e| e.trim().is_empty()) {
            contact.email = Some(p.email().to_string());
        }
        p.user_id().aggregate_id()
    });

    let placed = services.checkout().place(
        CheckoutRequest {
            customer_id,
            contact,
            fulfillment,
            lines: body.lines,
            payment_method,
            notes: body.notes,
        },
        Utc::now(),
    )?;

    let order = services
        .read_models
        .orders
        .get(&placed.order_id)
        .ok_or(ApiError::NotFound("order"))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": placed.order_id,
            "tracking_code": placed.tracking_code,
            "currency": services.config.currency,
            "order": order,
        })),
    ))
}

pub async fn track_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> ApiResult<Json<TrackedOrder>> {
    let view = find_by_code(&services, &code)?;
    Ok(Json(view.into()))
}

pub async fn track_order_stream(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let view = find_by_code(&services, &code)?;
    Ok(services::order_sse_stream(&services, &view))
}

pub async fn cancel_tracked_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
    Json(body): Json<dto::TrackingCancelRequest>,
) -> ApiResult<Json<TrackedOrder>> {
    let view = find_by_code(&services, &code)?;
    let given = validate::phone(&body.phone)?;
    let on_order = validate::phone(&view.contact.phone).unwrap_or_else(|_| view.contact.phone.clone());
    if given != on_order {
        return Err(ApiError::Forbidden("phone number does not match this order".to_string()));
    }

    services.checkout().cancel(view.id, body.reason, true, Utc::now())?;
    let view = services.read_models.orders.get(&view.id).ok_or(ApiError::NotFound("order"))?;
    Ok(Json(view.into()))
}

fn find_by_code(services: &AppServices, raw: &str) -> ApiResult<OrderView> {
    let code = TrackingCode::parse(raw)?;
    services
        .read_models
        .orders
        .by_tracking_code(&code)
        .ok_or(ApiError::NotFound("order"))
}

// -------------------------
// Admin
// -------------------------

pub async fn admin_list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::AdminOrdersQuery>,
) -> ApiResult<Json<Page<OrderView>>> {
    authz::require(&principal, perm::ORDERS_MANAGE)?;

    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => None,
        Some(raw) => Some(OrderStatus::normalize(raw)?),
    };
    let orders = services.read_models.orders.query(&OrderQuery {
        status,
        from: q.from,
        to: q.to,
        customer_id: None,
    });
    Ok(Json(paginate(orders, q.page, q.per_page)))
}

pub async fn admin_get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    authz::require(&principal, perm::ORDERS_MANAGE)?;
    let order_id: OrderId = parse_id(&id, "order")?;
    services
        .read_models
        .orders
        .get(&order_id)
        .map(Json)
        .ok_or(ApiError::NotFound("order"))
}

pub async fn admin_change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> ApiResult<Json<OrderView>> {
    authz::require(&principal, perm::ORDERS_MANAGE)?;
    let order_id: OrderId = parse_id(&id, "order")?;
    let status = OrderStatus::normalize(&body.status)?;
    if services.read_models.orders.get(&order_id).is_none() {
        return Err(ApiError::NotFound("order"));
    }

    services.checkout().change_status(order_id, status, body.note, Utc::now())?;
    services
        .read_models
        .orders
        .get(&order_id)
        .map(Json)
        .ok_or(ApiError::NotFound("order"))
}
