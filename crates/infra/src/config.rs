//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Parsing works over any
//! key/value iterator so tests never touch the process environment.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

use shopdesk_products::DistributionConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEV_JWT_SECRET: &str = "dev-secret";

/// Prefix of per-distribution level overrides, e.g.
/// `DISTRIBUTION_LEVELS_USER_PAYMENT_COUNT=1,2,5,10`.
pub const DISTRIBUTION_LEVELS_PREFIX: &str = "DISTRIBUTION_LEVELS_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("invalid distribution levels: {0}")]
    Distribution(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub page_size: u32,
    pub distributions: DistributionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret.to_string(),
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let use_persistent = match get("USE_PERSISTENT_STORES") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|e| invalid("USE_PERSISTENT_STORES", e))?,
            None => false,
        };
        let database_url = if use_persistent {
            Some(
                get("DATABASE_URL")
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?
                    .to_string(),
            )
        } else {
            None
        };

        let page_size = match get("PAGE_SIZE") {
            Some(v) => v.parse::<u32>().map_err(|e| invalid("PAGE_SIZE", e))?,
            None => DEFAULT_PAGE_SIZE,
        };
        if page_size == 0 {
            return Err(invalid("PAGE_SIZE", "must be positive"));
        }

        let mut distributions = DistributionConfig::default();
        let mut overrides: Vec<(&String, &String)> = vars
            .iter()
            .filter(|(k, _)| k.starts_with(DISTRIBUTION_LEVELS_PREFIX))
            .collect();
        overrides.sort();
        for (key, raw) in overrides {
            let name = key[DISTRIBUTION_LEVELS_PREFIX.len()..].to_lowercase();
            let levels = parse_levels(raw).map_err(|message| ConfigError::Invalid {
                key: key.clone(),
                message,
            })?;
            distributions
                .set(&name, levels)
                .map_err(|e| ConfigError::Distribution(e.to_string()))?;
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url,
            page_size,
            distributions,
        })
    }
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: err.to_string(),
    }
}

/// Comma-separated numbers.
fn parse_levels(raw: &str) -> Result<Vec<f64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|e| format!("'{s}': {e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdesk_products::DistributionMetric;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        AppConfig::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.distributions, DistributionConfig::default());
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        assert_eq!(
            load(&[("USE_PERSISTENT_STORES", "true")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
        let cfg = load(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/shop"));

        // URL alone does not switch stores
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn distribution_levels_are_overridden_and_normalised() {
        let cfg = load(&[("DISTRIBUTION_LEVELS_USER_PAYMENT_COUNT", "10, 2,5")]).unwrap();
        assert_eq!(
            cfg.distributions
                .levels(DistributionMetric::PaymentCount)
                .as_slice(),
            &[0.0, 2.0, 5.0, 10.0]
        );
    }

    #[test]
    fn too_few_levels_fail_at_load_time() {
        let err = load(&[("DISTRIBUTION_LEVELS_PRODUCT_SHOP_COUNT", "1,2")]).unwrap_err();
        assert!(matches!(err, ConfigError::Distribution(_)));

        let err = load(&[("DISTRIBUTION_LEVELS_NOT_A_METRIC", "1,2,3")]).unwrap_err();
        assert!(matches!(err, ConfigError::Distribution(_)));

        let err = load(&[("DISTRIBUTION_LEVELS_USER_PAYMENT_AMOUNT", "1,x,3")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_scalars_are_rejected() {
        assert!(load(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(load(&[("PAGE_SIZE", "0")]).is_err());
        assert!(load(&[("PAGE_SIZE", "ten")]).is_err());
        assert!(load(&[("USE_PERSISTENT_STORES", "maybe")]).is_err());
    }
}
