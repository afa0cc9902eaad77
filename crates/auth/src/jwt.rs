//! HS256 token issuing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{JwtClaims, TokenError, validate_claims};
use crate::{Role, UserId};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Mints tokens for authenticated users.
#[derive(Clone)]
pub struct JwtIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            roles,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn issued_token_validates() {
        let issuer = JwtIssuer::new(SECRET, Duration::minutes(30));
        let validator = Hs256JwtValidator::new(SECRET);
        let user = UserId::generate();
        let now = Utc::now();

        let token = issuer.issue(user, "ana@example.com", vec![Role::CUSTOMER], now).unwrap();
        let claims = validator.validate(&token, now).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.roles, vec![Role::CUSTOMER]);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = JwtIssuer::new(SECRET, Duration::minutes(30));
        let validator = Hs256JwtValidator::new(b"another-secret");
        let token = issuer
            .issue(UserId::generate(), "a@b.co", vec![Role::ADMIN], Utc::now())
            .unwrap();

        assert_eq!(validator.validate(&token, Utc::now()), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = JwtIssuer::new(SECRET, Duration::minutes(5));
        let validator = Hs256JwtValidator::new(SECRET);
        let issued = Utc::now() - Duration::minutes(10);
        let token = issuer
            .issue(UserId::generate(), "a@b.co", vec![Role::CUSTOMER], issued)
            .unwrap();

        assert_eq!(validator.validate(&token, Utc::now()), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let validator = Hs256JwtValidator::new(SECRET);
        assert!(matches!(
            validator.validate("not.a.jwt", Utc::now()),
            Err(TokenError::Malformed(_))
        ));
    }
}
