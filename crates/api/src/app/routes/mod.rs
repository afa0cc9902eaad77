use std::str::FromStr;

use axum::{
    Router,
    routing::{get, post},
};

use trattoria_core::{AggregateId, DomainError, slugify, unique_slug};
use trattoria_infra::{Namespace, UniqueIndex};

use crate::app::errors::{ApiError, ApiResult};

pub mod account;
pub mod auth;
pub mod blog;
pub mod catalog;
pub mod contact;
pub mod dashboard;
pub mod orders;
pub mod reservations;
pub mod system;
pub mod users;

/// Endpoints that need no identity.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
        .merge(catalog::public_router())
        .merge(orders::public_router())
        .route("/contact", post(contact::submit_message))
        .merge(blog::public_router())
}

/// Endpoints that accept guests but link the result to a signed-in caller.
pub fn optional_auth_router() -> Router {
    Router::new()
        .route("/orders", post(orders::place_order))
        .route("/reservations", post(reservations::request_reservation))
}

/// Endpoints behind the auth middleware; each handler checks its permission.
pub fn admin_router() -> Router {
    Router::new()
        .nest("/categories", catalog::admin_categories_router())
        .nest("/foods", catalog::admin_foods_router())
        .nest("/orders", orders::admin_router())
        .nest("/users", users::admin_router())
        .nest("/blog", blog::admin_router())
        .nest("/reservations", reservations::admin_router())
        .nest("/messages", contact::admin_router())
        .nest("/dashboard", dashboard::admin_router())
}

pub(crate) fn parse_id<T>(raw: &str, what: &str) -> ApiResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|_| ApiError::invalid_id(what))
}

/// Claims a free slug derived from `name` for `owner`.
///
/// With `current = Some((old_name, old_slug))` the old slug is kept as long
/// as the name still slugifies the same way.
pub(crate) fn claim_slug(
    index: &UniqueIndex,
    ns: Namespace,
    name: &str,
    owner: AggregateId,
    current: Option<(&str, &str)>,
) -> ApiResult<String> {
    let base = slugify(name);
    if let Some((old_name, old_slug)) = current {
        if slugify(old_name) == base {
            return Ok(old_slug.to_string());
        }
    }
    let slug = unique_slug(&base, |s| index.owner(ns, s).is_some_and(|o| o != owner));
    index.claim(ns, &slug, owner)?;
    Ok(slug)
}

/// After an update: drop whichever of `old`/`new` the aggregate no longer uses.
pub(crate) fn settle_claim(index: &UniqueIndex, ns: Namespace, owner: AggregateId, old: &str, new: &str, committed: bool) {
    if old.eq_ignore_ascii_case(new) {
        return;
    }
    let stale = if committed { old } else { new };
    index.release(ns, stale, owner);
}
