use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    routing::get,
};
use chrono::Utc;

use trattoria_auth::permissions as perm;
use trattoria_infra::dashboard::{self, DashboardCounts, DashboardStats, SalesRange, SalesSeries};
use trattoria_infra::projections::FoodQuery;
use trattoria_reservations::ReservationStatus;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(overview))
        .route("/sales", get(sales))
}

pub async fn overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<DashboardStats>> {
    authz::require(&principal, perm::DASHBOARD_VIEW)?;
    let models = &services.read_models;

    let counts = DashboardCounts {
        foods: models
            .foods
            .search(&FoodQuery {
                include_unavailable: true,
                ..FoodQuery::default()
            })
            .len(),
        categories: models.categories.list().len(),
        customers: models.users.list().iter().filter(|u| !u.role.is_admin()).count(),
        published_posts: models.posts.published(None).len(),
        pending_reservations: models.reservations.list(Some(ReservationStatus::Pending), None).len(),
        unread_messages: models.messages.list(Some(true)).len(),
    };

    let stats = dashboard::stats(&models.orders.all(), counts, Utc::now())?;
    Ok(Json(stats))
}

pub async fn sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::SalesQuery>,
) -> ApiResult<Json<SalesSeries>> {
    authz::require(&principal, perm::DASHBOARD_VIEW)?;
    let range = SalesRange::parse(q.range.as_deref().unwrap_or_default())?;
    let series = dashboard::sales_series(&services.read_models.orders.all(), range, Utc::now())?;
    Ok(Json(series))
}
