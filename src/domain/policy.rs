use crate::domain::value_objects::Money;
use serde::{Deserialize, Serialize};

/// Checkout rules handed explicitly to the validator, the totals
/// calculator and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPolicy {
    /// Upper bound on the quantity of a single medicine per order
    pub max_quantity_per_medicine: u32,

    /// Tax rate in basis points (1400 = 14%)
    pub tax_rate_bps: u32,

    /// Flat shipping fee
    pub shipping_fee: Money,

    /// Currency used when the checkout request names none
    pub default_currency: String,

    /// Attempts per checkout when the store reports a lock conflict
    pub max_attempts: u32,

    /// Delivery estimate shown on the checkout summary
    pub estimated_delivery: String,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            max_quantity_per_medicine: 10,
            tax_rate_bps: 1_400,
            shipping_fee: Money::from_major(30),
            default_currency: "EGP".to_string(),
            max_attempts: 3,
            estimated_delivery: "1-2 business days".to_string(),
        }
    }
}
