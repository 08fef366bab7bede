//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `PUBLIC_BASE_URL` - Public URL of the storefront, used for checkout redirects
//! - `STRIPE_SECRET_KEY` - Payment provider API key
//! - `STRIPE_WEBHOOK_SECRET` - Shared secret for webhook signatures
//!
//! ## Optional
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `STRIPE_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_TIMEOUT_SECS` - Provider request timeout (default: 10)
//! - `WEBHOOK_TOLERANCE_SECS` - Accepted webhook clock skew (default: 300)
//! - `CURRENCY` - ISO currency code charged (default: usd)
//! - `NATS_URL` - Broker for domain events

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub port: u16,
    pub public_base_url: String,
    pub currency: String,
    pub nats_url: Option<String>,
    pub payment: PaymentConfig,
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub timeout: Duration,
    pub webhook_tolerance_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[REDACTED]")
            .field("database_max_connections", &self.database_max_connections)
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("currency", &self.currency)
            .field("nats_url", &self.nats_url)
            .field("payment", &self.payment)
            .finish()
    }
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns `None` for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };

        let public_base_url = required("PUBLIC_BASE_URL")?;
        if !(public_base_url.starts_with("http://") || public_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidEnvVar("PUBLIC_BASE_URL".into(), "must be an http(s) URL".into()));
        }
        let currency = optional("CURRENCY", "usd").to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar("CURRENCY".into(), "must be a three-letter ISO code".into()));
        }

        Ok(Self {
            database_url: SecretString::from(required("DATABASE_URL")?),
            database_max_connections: parse_num("DATABASE_MAX_CONNECTIONS", &optional("DATABASE_MAX_CONNECTIONS", "10"))?,
            port: parse_num("PORT", &optional("PORT", "8083"))?,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            currency,
            nats_url: lookup("NATS_URL").filter(|v| !v.trim().is_empty()),
            payment: PaymentConfig {
                api_base: optional("STRIPE_API_BASE", "https://api.stripe.com"),
                secret_key: SecretString::from(required("STRIPE_SECRET_KEY")?),
                webhook_secret: SecretString::from(required("STRIPE_WEBHOOK_SECRET")?),
                timeout: Duration::from_secs(parse_num("STRIPE_TIMEOUT_SECS", &optional("STRIPE_TIMEOUT_SECS", "10"))?),
                webhook_tolerance_secs: parse_num("WEBHOOK_TOLERANCE_SECS", &optional("WEBHOOK_TOLERANCE_SECS", "300"))?,
            },
        })
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |k| map.get(k).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://shop:pw@localhost/shop"),
        ("PUBLIC_BASE_URL", "https://shop.example/"),
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(env(BASE)).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.currency, "usd");
        assert_eq!(config.public_base_url, "https://shop.example");
        assert_eq!(config.payment.timeout, Duration::from_secs(10));
        assert_eq!(config.payment.webhook_tolerance_secs, 300);
        assert_eq!(config.payment.webhook_secret.expose_secret(), "whsec_123");
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_missing_required() {
        let err = AppConfig::from_lookup(env(&BASE[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "DATABASE_URL"));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(AppConfig::from_lookup(env(&pairs)), Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));

        let mut pairs = BASE.to_vec();
        pairs.push(("CURRENCY", "dollars"));
        assert!(AppConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(env(BASE)).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk_test_123"));
        assert!(!printed.contains("whsec_123"));
        assert!(!printed.contains("pw@"));
    }
}
