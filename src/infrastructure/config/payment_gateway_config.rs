use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentGatewayConfig {
    /// Gateway base URL; `None` runs in cash-only mode
    pub base_url: Option<String>,

    /// Shared secret for request signing
    pub secret: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl PaymentGatewayConfig {
    pub fn from_env() -> DomainResult<Arc<Self>> {
        let base_url = std::env::var("PAYMENT_GATEWAY_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let secret = match (&base_url, std::env::var("PAYMENT_GATEWAY_SECRET")) {
            (_, Ok(secret)) => secret,
            (None, Err(_)) => String::new(),
            (Some(_), Err(_)) => {
                return Err(DomainError::Configuration(
                    "PAYMENT_GATEWAY_SECRET must be set when PAYMENT_GATEWAY_URL is set"
                        .to_string(),
                ));
            }
        };

        let timeout_secs = match std::env::var("PAYMENT_GATEWAY_TIMEOUT_SECS") {
            Ok(value) => value.parse().map_err(|_| {
                DomainError::Configuration(format!(
                    "PAYMENT_GATEWAY_TIMEOUT_SECS is not a number: {}",
                    value
                ))
            })?,
            Err(_) => 10,
        };

        Ok(Arc::new(Self {
            base_url,
            secret,
            timeout_secs,
        }))
    }

    /// Cash-only configuration with no remote gateway
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            base_url: None,
            secret: String::new(),
            timeout_secs: 10,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
