//! The signed-in customer's own profile, orders and reservations.
//!
//! Ownership is checked against the read models: someone else's order or
//! reservation answers 404, never 403.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use trattoria_auth::permissions as perm;
use trattoria_auth::{
    ChangePassword, UpdateProfile, User, UserCommand, UserId, user, validate_password_strength,
};
use trattoria_infra::projections::{OrderQuery, OrderView, ReservationView, UserView};
use trattoria_orders::OrderId;
use trattoria_reservations::{CancelReservation, Reservation, ReservationCommand, ReservationId, reservation};

use crate::app::dto::{self, Page, paginate};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::{AppServices, hash_password_blocking, verify_password_blocking};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", post(change_password))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/reservations", get(list_reservations))
        .route("/reservations/:id/cancel", post(cancel_reservation))
}

pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<UserView>> {
    current_user(&services, &principal).map(Json)
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> ApiResult<Json<UserView>> {
    authz::require(&principal, perm::PROFILE_MANAGE)?;
    let user_id = principal.user_id();

    let cmd = UserCommand::UpdateProfile(UpdateProfile {
        user_id,
        name: body.name,
        phone: body.phone,
        default_address: body.default_address,
        occurred_at: Utc::now(),
    });
    services.dispatch(user_id.aggregate_id(), user::AGGREGATE_TYPE, cmd, |id| {
        User::empty(UserId::new(id))
    })?;
    current_user(&services, &principal).map(Json)
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, perm::PROFILE_MANAGE)?;
    let current = current_user(&services, &principal)?;
    if !verify_password_blocking(body.current_password, current.password_hash.clone()).await? {
        return Err(ApiError::validation("current password is incorrect"));
    }
    validate_password_strength(&body.new_password)?;
    let password_hash = hash_password_blocking(body.new_password).await?;

    let cmd = UserCommand::ChangePassword(ChangePassword {
        user_id: current.id,
        password_hash,
        occurred_at: Utc::now(),
    });
    services.dispatch(current.id.aggregate_id(), user::AGGREGATE_TYPE, cmd, |id| {
        User::empty(UserId::new(id))
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PageQuery>,
) -> ApiResult<Json<Page<OrderView>>> {
    authz::require(&principal, perm::ORDERS_OWN)?;
    let orders = services.read_models.orders.query(&OrderQuery {
        customer_id: Some(principal.user_id().aggregate_id()),
        ..OrderQuery::default()
    });
    Ok(Json(paginate(orders, q.page, q.per_page)))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    authz::require(&principal, perm::ORDERS_OWN)?;
    own_order(&services, &principal, &id).map(Json)
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> ApiResult<Json<OrderView>> {
    authz::require(&principal, perm::ORDERS_OWN)?;
    let order = own_order(&services, &principal, &id)?;
    let reason = body.and_then(|Json(b)| b.reason);

    services.checkout().cancel(order.id, reason, true, Utc::now())?;
    services
        .read_models
        .orders
        .get(&order.id)
        .map(Json)
        .ok_or(ApiError::NotFound("order"))
}

pub async fn list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<ReservationView>>> {
    authz::require(&principal, perm::RESERVATIONS_OWN)?;
    let mine = services
        .read_models
        .reservations
        .list(None, Some(principal.user_id().aggregate_id()));
    Ok(Json(mine))
}

pub async fn cancel_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReservationView>> {
    authz::require(&principal, perm::RESERVATIONS_OWN)?;
    let reservation_id: ReservationId = parse_id(&id, "reservation")?;
    let owned = services
        .read_models
        .reservations
        .get(&reservation_id)
        .filter(|r| r.user_id == Some(principal.user_id().aggregate_id()))
        .ok_or(ApiError::NotFound("reservation"))?;

    let cmd = ReservationCommand::Cancel(CancelReservation {
        reservation_id: owned.id,
        by_customer: true,
        occurred_at: Utc::now(),
    });
    services.dispatch(owned.id.aggregate_id(), reservation::AGGREGATE_TYPE, cmd, |id| {
        Reservation::empty(ReservationId::new(id))
    })?;
    services
        .read_models
        .reservations
        .get(&reservation_id)
        .map(Json)
        .ok_or(ApiError::NotFound("reservation"))
}

fn current_user(services: &AppServices, principal: &PrincipalContext) -> ApiResult<UserView> {
    services
        .read_models
        .users
        .get(&principal.user_id())
        .ok_or(ApiError::NotFound("user"))
}

fn own_order(services: &AppServices, principal: &PrincipalContext, raw_id: &str) -> ApiResult<OrderView> {
    let order_id: OrderId = parse_id(raw_id, "order")?;
    services
        .read_models
        .orders
        .get(&order_id)
        .filter(|o| o.customer_id == Some(principal.user_id().aggregate_id()))
        .ok_or(ApiError::NotFound("order"))
}
