use crate::domain::Cart;
use crate::ports::CartExpiryPolicy;
use chrono::{DateTime, Duration, Utc};

/// A cart expires once it has gone untouched for longer than the TTL
#[derive(Debug, Clone, Copy)]
pub struct TtlCartExpiry {
    ttl: Duration,
}

impl TtlCartExpiry {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }
}

impl Default for TtlCartExpiry {
    fn default() -> Self {
        Self::from_minutes(24 * 60)
    }
}

impl CartExpiryPolicy for TtlCartExpiry {
    fn is_expired(&self, cart: &Cart, now: DateTime<Utc>) -> bool {
        now - cart.updated_at > self.ttl
    }
}
