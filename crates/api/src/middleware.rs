use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use trattoria_auth::JwtValidator;
use trattoria_infra::projections::UsersProjection;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<UsersProjection>,
}

impl AuthState {
    /// Validate the token and resolve the user it names.
    ///
    /// The role comes from the users read model, not the token, so a demoted
    /// admin loses access immediately. Blocked users are rejected.
    fn resolve(&self, token: &str) -> Result<PrincipalContext, ApiError> {
        let claims = self.jwt.validate(token, Utc::now())?;
        let user = self
            .users
            .get(&claims.sub)
            .ok_or_else(|| ApiError::Unauthenticated("account no longer exists".to_string()))?;
        if user.blocked {
            return Err(ApiError::Forbidden("account is blocked".to_string()));
        }
        Ok(PrincipalContext::new(user.id, user.email, user.role))
    }
}

/// Requires a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?
        .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".to_string()))?;
    let principal = state.resolve(token)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Attaches the principal when a token is sent; anonymous requests pass.
///
/// A token that is sent but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers())? {
        let principal = state.resolve(token)?;
        req.extensions_mut().insert(principal);
    }
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let malformed = || ApiError::Unauthenticated("malformed authorization header".to_string());

    let header = header.to_str().map_err(|_| malformed())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(malformed)?.trim();
    if token.is_empty() {
        return Err(malformed());
    }
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).unwrap().is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers).unwrap(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());
    }
}
