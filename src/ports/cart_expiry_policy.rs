use crate::domain::Cart;
use chrono::{DateTime, Utc};

/// Decides whether a cart is too old to check out
pub trait CartExpiryPolicy: Send + Sync {
    fn is_expired(&self, cart: &Cart, now: DateTime<Utc>) -> bool;
}
