use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use trattoria_auth::permissions as perm;
use trattoria_infra::projections::ReservationView;
use trattoria_reservations::{
    ChangeReservationStatus, RequestReservation, Reservation, ReservationCommand, ReservationId, ReservationStatus,
    reservation,
};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(admin_list_reservations))
        .route("/:id/status", post(admin_change_status))
}

/// Public booking form. Signed-in customers get the reservation linked to
/// their account.
pub async fn request_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<dto::ReservationRequest>,
) -> ApiResult<(StatusCode, Json<ReservationView>)> {
    let reservation_id = ReservationId::generate();
    let cmd = ReservationCommand::Request(RequestReservation {
        reservation_id,
        user_id: principal.map(|Extension(p)| p.user_id().aggregate_id()),
        name: body.name,
        email: body.email,
        phone: body.phone,
        party_size: body.party_size,
        reserved_for: body.reserved_for,
        notes: body.notes,
        occurred_at: Utc::now(),
    });
    dispatch(&services, reservation_id, cmd)?;

    let view = services
        .read_models
        .reservations
        .get(&reservation_id)
        .ok_or(ApiError::NotFound("reservation"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn admin_list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<ReservationView>>> {
    authz::require(&principal, perm::RESERVATIONS_MANAGE)?;
    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => None,
        Some(raw) => Some(ReservationStatus::normalize(raw)?),
    };
    Ok(Json(services.read_models.reservations.list(status, None)))
}

pub async fn admin_change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> ApiResult<Json<ReservationView>> {
    authz::require(&principal, perm::RESERVATIONS_MANAGE)?;
    let reservation_id: ReservationId = parse_id(&id, "reservation")?;
    let status = ReservationStatus::normalize(&body.status)?;

    let cmd = ReservationCommand::ChangeStatus(ChangeReservationStatus {
        reservation_id,
        status,
        occurred_at: Utc::now(),
    });
    dispatch(&services, reservation_id, cmd)?;
    services
        .read_models
        .reservations
        .get(&reservation_id)
        .map(Json)
        .ok_or(ApiError::NotFound("reservation"))
}

fn dispatch(services: &AppServices, reservation_id: ReservationId, cmd: ReservationCommand) -> ApiResult<()> {
    services.dispatch(reservation_id.aggregate_id(), reservation::AGGREGATE_TYPE, cmd, |id| {
        Reservation::empty(ReservationId::new(id))
    })?;
    Ok(())
}
