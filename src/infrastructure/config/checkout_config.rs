use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CheckoutPolicy, Money};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Checkout service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub database_url: String,

    /// Pool size
    pub database_max_connections: u32,

    /// InnoDB lock wait bound per session
    pub lock_wait_timeout_secs: u64,

    /// Minutes a cart may sit untouched before it expires
    pub cart_ttl_minutes: i64,

    /// Root directory for prescription uploads
    pub prescription_upload_dir: String,

    pub policy: CheckoutPolicy,
}

impl CheckoutConfig {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup<L>(lookup: L) -> DomainResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| DomainError::Configuration("DATABASE_URL must be set".to_string()))?;

        let defaults = CheckoutPolicy::default();
        let policy = CheckoutPolicy {
            max_quantity_per_medicine: parse_or(
                &lookup,
                "MAX_QUANTITY_PER_MEDICINE",
                defaults.max_quantity_per_medicine,
            )?,
            tax_rate_bps: parse_or(&lookup, "TAX_RATE_BPS", defaults.tax_rate_bps)?,
            shipping_fee: Money::from_cents(parse_or(
                &lookup,
                "SHIPPING_FEE_CENTS",
                defaults.shipping_fee.to_cents(),
            )?),
            default_currency: lookup("DEFAULT_CURRENCY").unwrap_or(defaults.default_currency),
            max_attempts: parse_or(&lookup, "CHECKOUT_MAX_ATTEMPTS", defaults.max_attempts)?,
            estimated_delivery: lookup("ESTIMATED_DELIVERY")
                .unwrap_or(defaults.estimated_delivery),
        };

        if policy.max_attempts == 0 {
            return Err(DomainError::Configuration(
                "CHECKOUT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            lock_wait_timeout_secs: parse_or(&lookup, "LOCK_WAIT_TIMEOUT_SECS", 10)?,
            cart_ttl_minutes: parse_or(&lookup, "CART_TTL_MINUTES", 24 * 60)?,
            prescription_upload_dir: lookup("PRESCRIPTION_UPLOAD_DIR")
                .unwrap_or_else(|| "storage/prescriptions".to_string()),
            policy,
        })
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_wait_timeout_secs)
    }
}

fn parse_or<L, T>(lookup: &L, key: &str, default: T) -> DomainResult<T>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| {
            DomainError::Configuration(format!("{} has an invalid value: {}", key, value))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            CheckoutConfig::from_lookup(lookup(&[("DATABASE_URL", "mysql://db")])).unwrap();

        assert_eq!(config.policy, CheckoutPolicy::default());
        assert_eq!(config.cart_ttl_minutes, 1440);
        assert_eq!(config.lock_wait_timeout_secs, 10);
        assert_eq!(config.prescription_upload_dir, "storage/prescriptions");
    }

    #[test]
    fn test_overrides() {
        let config = CheckoutConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://db"),
            ("TAX_RATE_BPS", "500"),
            ("SHIPPING_FEE_CENTS", "0"),
            ("DEFAULT_CURRENCY", "USD"),
            ("MAX_QUANTITY_PER_MEDICINE", "3"),
        ]))
        .unwrap();

        assert_eq!(config.policy.tax_rate_bps, 500);
        assert_eq!(config.policy.shipping_fee, Money::ZERO);
        assert_eq!(config.policy.default_currency, "USD");
        assert_eq!(config.policy.max_quantity_per_medicine, 3);
    }

    #[test]
    fn test_missing_database_url_is_a_configuration_error() {
        let result = CheckoutConfig::from_lookup(lookup(&[]));

        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let result = CheckoutConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://db"),
            ("TAX_RATE_BPS", "fourteen"),
        ]));

        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }
}
