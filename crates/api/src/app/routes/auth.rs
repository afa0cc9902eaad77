use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use tracing::info;

use trattoria_auth::Role;
use trattoria_core::validate;
use trattoria_infra::projections::UserView;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::{AppServices, verify_password_blocking};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let name = validate::require("name", &body.name)?;
    let phone = body.phone.filter(|p| !p.trim().is_empty());
    let now = Utc::now();

    let user_id = services
        .register_user(&name, &body.email, phone, &body.password, Role::CUSTOMER, now)
        .await?;
    let user = services
        .read_models
        .users
        .get(&user_id)
        .ok_or_else(|| ApiError::Internal(format!("user {user_id} missing from read model")))?;
    info!(user_id = %user_id, "customer registered");

    Ok((StatusCode::CREATED, Json(session(&services, user, now)?)))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult<Json<JsonValue>> {
    let rejected = || ApiError::Unauthenticated("invalid email or password".to_string());

    let email = validate::email(&body.email).map_err(|_| rejected())?;
    let user = services.read_models.users.by_email(&email).ok_or_else(rejected)?;
    if !verify_password_blocking(body.password, user.password_hash.clone()).await? {
        return Err(rejected());
    }
    if user.blocked {
        return Err(ApiError::Forbidden("account is blocked".to_string()));
    }

    Ok(Json(session(&services, user, Utc::now())?))
}

fn session(services: &AppServices, user: UserView, now: DateTime<Utc>) -> ApiResult<JsonValue> {
    let token = services
        .issuer
        .issue(user.id, &user.email, vec![user.role.clone()], now)?;
    Ok(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_at": now + services.issuer.ttl(),
        "user": user,
    }))
}
