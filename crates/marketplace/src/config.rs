//! Marketplace configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETPLACE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `MARKETPLACE_HOST` - Bind address (default: 127.0.0.1)
//! - `MARKETPLACE_PORT` - Listen port (default: 3000)
//! - `SIGNUP_DISCOUNT_VALUE` - Signup discount granted at registration (default: 10)
//! - `SIGNUP_DISCOUNT_TYPE` - `PERCENTAGE` or `FIXED` (default: `PERCENTAGE`)
//! - `LOYALTY_TIERS` - `threshold:percent` pairs (default: `5:5,10:10,20:15`)
//! - `CHECKOUT_MAX_CLAIM_ATTEMPTS` - Signup claim attempts per checkout (default: 3)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use qreserve_core::{DiscountType, LoyaltyTiers};

const DEFAULT_LOYALTY_TIERS: &str = "5:5,10:10,20:15";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Marketplace application configuration.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub signup_discount: SignupDiscountConfig,
    pub loyalty_tiers: LoyaltyTiers,
    pub max_claim_attempts: u32,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Discount granted to every new user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignupDiscountConfig {
    pub discount: Decimal,
    pub discount_type: DiscountType,
}

impl Default for SignupDiscountConfig {
    fn default() -> Self {
        Self {
            discount: Decimal::from(10),
            discount_type: DiscountType::Percentage,
        }
    }
}

impl MarketplaceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or any value fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARKETPLACE_DATABASE_URL")?;
        let host = get_env_or_default("MARKETPLACE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MARKETPLACE_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("MARKETPLACE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MARKETPLACE_PORT".to_string(), e.to_string())
            })?;

        let signup_discount = parse_signup_discount(
            &get_env_or_default("SIGNUP_DISCOUNT_VALUE", "10"),
            &get_env_or_default("SIGNUP_DISCOUNT_TYPE", "PERCENTAGE"),
        )?;
        let loyalty_tiers = get_env_or_default("LOYALTY_TIERS", DEFAULT_LOYALTY_TIERS)
            .parse::<LoyaltyTiers>()
            .map_err(|e| ConfigError::InvalidEnvVar("LOYALTY_TIERS".to_string(), e.to_string()))?;
        let max_claim_attempts =
            parse_claim_attempts(&get_env_or_default("CHECKOUT_MAX_CLAIM_ATTEMPTS", "3"))?;

        Ok(Self {
            database_url,
            host,
            port,
            signup_discount,
            loyalty_tiers,
            max_claim_attempts,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        })
    }

    /// Configuration with defaults for everything but the database URL.
    #[must_use]
    pub fn with_database_url(database_url: SecretString) -> Self {
        Self {
            database_url,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            signup_discount: SignupDiscountConfig::default(),
            loyalty_tiers: LoyaltyTiers::standard(),
            max_claim_attempts: 3,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_signup_discount(value: &str, kind: &str) -> Result<SignupDiscountConfig, ConfigError> {
    let discount = value.trim().parse::<Decimal>().map_err(|e| {
        ConfigError::InvalidEnvVar("SIGNUP_DISCOUNT_VALUE".to_string(), e.to_string())
    })?;
    let discount_type = kind.parse::<DiscountType>().map_err(|e| {
        ConfigError::InvalidEnvVar("SIGNUP_DISCOUNT_TYPE".to_string(), e.to_string())
    })?;

    let over_cap = discount_type == DiscountType::Percentage && discount > Decimal::ONE_HUNDRED;
    if discount.is_sign_negative() || over_cap {
        return Err(ConfigError::InvalidEnvVar(
            "SIGNUP_DISCOUNT_VALUE".to_string(),
            format!("{discount} is out of range for {discount_type}"),
        ));
    }

    Ok(SignupDiscountConfig {
        discount,
        discount_type,
    })
}

fn parse_claim_attempts(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(attempts) if attempts >= 1 => Ok(attempts),
        Ok(_) => Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_MAX_CLAIM_ATTEMPTS".to_string(),
            "must be at least 1".to_string(),
        )),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_MAX_CLAIM_ATTEMPTS".to_string(),
            e.to_string(),
        )),
    }
}

fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
