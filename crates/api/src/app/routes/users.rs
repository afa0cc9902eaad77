//! Admin user management. Admins cannot block or demote their own account,
//! which keeps at least one working admin around.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;

use trattoria_auth::permissions as perm;
use trattoria_auth::{AssignRole, BlockUser, Role, UnblockUser, User, UserCommand, UserId, user};
use trattoria_infra::projections::UserView;

use crate::app::dto::{self, Page, paginate};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user))
        .route("/:id/role", post(assign_role))
        .route("/:id/block", post(block_user))
        .route("/:id/unblock", post(unblock_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PageQuery>,
) -> ApiResult<Json<Page<UserView>>> {
    authz::require(&principal, perm::USERS_MANAGE)?;
    Ok(Json(paginate(services.read_models.users.list(), q.page, q.per_page)))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    authz::require(&principal, perm::USERS_MANAGE)?;
    let user_id: UserId = parse_id(&id, "user")?;
    find(&services, user_id).map(Json)
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RoleRequest>,
) -> ApiResult<Json<UserView>> {
    authz::require(&principal, perm::USERS_MANAGE)?;
    let user_id: UserId = parse_id(&id, "user")?;
    let role = Role::parse(&body.role)?;
    if user_id == principal.user_id() && !role.is_admin() {
        return Err(ApiError::validation("you cannot remove your own admin role"));
    }
    find(&services, user_id)?;

    let cmd = UserCommand::AssignRole(AssignRole {
        user_id,
        role,
        occurred_at: Utc::now(),
    });
    dispatch(&services, user_id, cmd)?;
    find(&services, user_id).map(Json)
}

pub async fn block_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::BlockRequest>>,
) -> ApiResult<Json<UserView>> {
    authz::require(&principal, perm::USERS_MANAGE)?;
    let user_id: UserId = parse_id(&id, "user")?;
    if user_id == principal.user_id() {
        return Err(ApiError::validation("you cannot block your own account"));
    }
    find(&services, user_id)?;

    let reason = body
        .and_then(|Json(b)| b.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "blocked by an administrator".to_string());
    let cmd = UserCommand::Block(BlockUser {
        user_id,
        reason,
        occurred_at: Utc::now(),
    });
    dispatch(&services, user_id, cmd)?;
    find(&services, user_id).map(Json)
}

pub async fn unblock_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    authz::require(&principal, perm::USERS_MANAGE)?;
    let user_id: UserId = parse_id(&id, "user")?;
    find(&services, user_id)?;

    let cmd = UserCommand::Unblock(UnblockUser {
        user_id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, user_id, cmd)?;
    find(&services, user_id).map(Json)
}

fn find(services: &AppServices, user_id: UserId) -> ApiResult<UserView> {
    services.read_models.users.get(&user_id).ok_or(ApiError::NotFound("user"))
}

fn dispatch(services: &AppServices, user_id: UserId, cmd: UserCommand) -> ApiResult<()> {
    services.dispatch(user_id.aggregate_id(), user::AGGREGATE_TYPE, cmd, |id| {
        User::empty(UserId::new(id))
    })?;
    Ok(())
}
