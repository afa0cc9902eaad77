use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Role, UserId};

/// Bearer token claims. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: UserId,
    pub email: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Check the claims' time window against `now`.
///
/// Signature verification happens in [`crate::jwt`]; this only looks at `iat`
/// and `exp`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> JwtClaims {
        JwtClaims {
            sub: UserId::generate(),
            email: "guest@example.com".into(),
            roles: vec![Role::CUSTOMER],
            iat,
            exp,
        }
    }

    #[test]
    fn window_is_checked() {
        let now = Utc::now();
        let t = now.timestamp();
        assert!(validate_claims(&claims(t - 10, t + 10), now).is_ok());
        assert_eq!(validate_claims(&claims(t - 20, t - 10), now), Err(TokenError::Expired));
        assert_eq!(validate_claims(&claims(t + 10, t + 20), now), Err(TokenError::NotYetValid));
        assert_eq!(validate_claims(&claims(t, t), now), Err(TokenError::InvalidTimeWindow));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let t = now.timestamp();
        assert_eq!(validate_claims(&claims(t - 5, t), now), Err(TokenError::Expired));
    }
}
