//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store, bus, read models, dispatcher and workers
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs, query filters and pagination
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build services from `config` and the router that serves them.
pub async fn build_app(config: AppConfig) -> anyhow::Result<(Router, Arc<AppServices>)> {
    let services = services::build_services(config).await?;
    Ok((router(services.clone()), services))
}

/// The full route tree over already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    let jwt = Arc::new(trattoria_auth::Hs256JwtValidator::new(services.config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState {
        jwt,
        users: services.read_models.users.clone(),
    };

    let guest_or_user = routes::optional_auth_router().layer(axum::middleware::from_fn_with_state(
        auth_state.clone(),
        middleware::optional_auth_middleware,
    ));

    let protected = Router::new()
        .nest("/me", routes::account::router())
        .nest("/admin", routes::admin_router())
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let cors = cors_layer(services.config.cors_origins.as_deref());

    Router::new()
        .merge(routes::public_router())
        .merge(guest_or_user)
        .merge(protected)
        .layer(Extension(services))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        None => AllowOrigin::from(Any),
        Some(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(origin = %origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}
