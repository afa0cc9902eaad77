//! Process configuration read from the environment.
//!
//! Every setting has a default. A value that is set but unparsable is logged
//! and replaced by the default rather than aborting startup.

use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use chrono::Duration;
use tracing::{info, warn};

use trattoria_core::Money;
use trattoria_orders::DeliveryPolicy;

const DEV_JWT_SECRET: &str = "trattoria-dev-secret";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 1440;
const MAX_TOKEN_TTL_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub currency: String,
    pub delivery: DeliveryPolicy,
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            currency: "USD".to_string(),
            delivery: DeliveryPolicy::default(),
            cors_origins: None,
            admin_email: None,
            admin_password: None,
            use_persistent_stores: false,
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let free_threshold: u64 = try_load("FREE_DELIVERY_THRESHOLD_CENTS", 3000);
        let min_order: u64 = try_load("MIN_DELIVERY_ORDER_CENTS", 0);

        Self {
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr),
            jwt_secret,
            token_ttl: token_ttl(try_load("TOKEN_TTL_MINUTES", DEFAULT_TOKEN_TTL_MINUTES)),
            currency: var("CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.currency),
            delivery: DeliveryPolicy {
                flat_fee: Money::from_cents(try_load("DELIVERY_FEE_CENTS", 300u64)),
                free_threshold: (free_threshold > 0).then(|| Money::from_cents(free_threshold)),
                min_order: (min_order > 0).then(|| Money::from_cents(min_order)),
            },
            cors_origins: var("CORS_ORIGINS").and_then(|raw| parse_origins(&raw)),
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            use_persistent_stores: try_load("USE_PERSISTENT_STORES", false),
            database_url: var("DATABASE_URL"),
        }
    }
}

/// Token lifetime, clamped to between one minute and thirty days.
fn token_ttl(minutes: i64) -> Duration {
    let clamped = minutes.clamp(1, MAX_TOKEN_TTL_MINUTES);
    if clamped != minutes {
        warn!("TOKEN_TTL_MINUTES {minutes} out of range; using {clamped}");
    }
    Duration::try_minutes(clamped).unwrap_or_else(|| Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES))
}

/// `*` (or an empty list) means any origin.
fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        None
    } else {
        Some(origins)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}; using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_allows_everything() {
        assert_eq!(parse_origins("*"), None);
        assert_eq!(parse_origins(" , "), None);
        assert_eq!(
            parse_origins("https://trattoria.test, http://localhost:5173"),
            Some(vec![
                "https://trattoria.test".to_string(),
                "http://localhost:5173".to_string()
            ])
        );
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.token_ttl, Duration::minutes(1440));
        assert_eq!(cfg.delivery.flat_fee, Money::from_cents(300));
        assert_eq!(cfg.delivery.free_threshold, Some(Money::from_cents(3000)));
        assert!(cfg.cors_origins.is_none());
    }

    #[test]
    fn token_ttl_is_clamped_instead_of_overflowing() {
        assert_eq!(token_ttl(90), Duration::minutes(90));
        assert_eq!(token_ttl(0), Duration::minutes(1));
        assert_eq!(token_ttl(-5), Duration::minutes(1));
        assert_eq!(token_ttl(i64::MAX), Duration::minutes(MAX_TOKEN_TTL_MINUTES));
    }
}
