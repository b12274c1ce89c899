use crate::domain::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Order status as stored on the shared `orders` table.
///
/// A cart is an order row that has not been checked out yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Mutable cart
    Cart,
    /// Checked out, awaiting fulfilment
    Pending,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Cart => write!(f, "cart"),
            OrderStatus::Pending => write!(f, "pending"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(OrderStatus::Cart),
            "pending" => Ok(OrderStatus::Pending),
            other => Err(DomainError::Decode(format!("Invalid order status: {}", other))),
        }
    }
}

/// Pharmacy operating status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PharmacyStatus {
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for PharmacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PharmacyStatus::Active => write!(f, "active"),
            PharmacyStatus::Inactive => write!(f, "inactive"),
            PharmacyStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for PharmacyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PharmacyStatus::Active),
            "inactive" => Ok(PharmacyStatus::Inactive),
            "suspended" => Ok(PharmacyStatus::Suspended),
            other => Err(DomainError::Decode(format!("Invalid pharmacy status: {}", other))),
        }
    }
}

/// Payment method chosen at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery
    #[default]
    Cash,
    /// Card through the online gateway
    Card,
    /// Mobile wallet through the online gateway
    Wallet,
}

impl PaymentMethod {
    /// Whether the method settles without contacting the gateway
    pub fn is_offline(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Wallet => write!(f, "wallet"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(DomainError::Decode(format!("Invalid payment method: {}", other))),
        }
    }
}

/// Payment state reported by the payment collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Awaiting collection or confirmation
    Pending,
    /// Captured
    Succeeded,
    /// Rejected or not reachable
    Failed,
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentState::Pending => write!(f, "pending"),
            PaymentState::Succeeded => write!(f, "succeeded"),
            PaymentState::Failed => write!(f, "failed"),
        }
    }
}

/// Row lock strength requested when loading a cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Blocks writers, allows other readers (preview / summary)
    Shared,
    /// Blocks everyone else (checkout commit)
    Exclusive,
}

/// Machine-readable failure codes returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CartNotFound,
    CartExpired,
    CartEmpty,
    PharmacyNotVerified,
    PharmacyInactive,
    NotAvailable,
    InsufficientStock,
    PriceChanged,
    EmailNotVerified,
    QuantityLimitExceeded,
    StockReservationFailed,
    OrderCreationFailed,
    SystemError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::CartNotFound => "cart_not_found",
            ErrorCode::CartExpired => "cart_expired",
            ErrorCode::CartEmpty => "cart_empty",
            ErrorCode::PharmacyNotVerified => "pharmacy_not_verified",
            ErrorCode::PharmacyInactive => "pharmacy_inactive",
            ErrorCode::NotAvailable => "not_available",
            ErrorCode::InsufficientStock => "insufficient_stock",
            ErrorCode::PriceChanged => "price_changed",
            ErrorCode::EmailNotVerified => "email_not_verified",
            ErrorCode::QuantityLimitExceeded => "quantity_limit_exceeded",
            ErrorCode::StockReservationFailed => "stock_reservation_failed",
            ErrorCode::OrderCreationFailed => "order_creation_failed",
            ErrorCode::SystemError => "system_error",
        };
        write!(f, "{}", code)
    }
}

/// Monetary amount (minor units, avoids floating point rounding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (piastres / cents)
    pub amount_cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { amount_cents: 0 };

    /// Create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Self {
            amount_cents: amount.saturating_mul(100),
        }
    }

    /// Create from minor units
    pub fn from_cents(cents: i64) -> Self {
        Self { amount_cents: cents }
    }

    /// Convert to whole currency units
    pub fn to_major(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// Convert to minor units
    pub fn to_cents(&self) -> i64 {
        self.amount_cents
    }

    /// Apply a rate given in basis points, rounding half away from zero
    /// to the nearest minor unit. Saturates at the `i64` bounds.
    pub fn apply_rate_bps(&self, bps: u32) -> Money {
        let scaled = self.amount_cents as i128 * bps as i128;
        let half = if scaled >= 0 { 5_000 } else { -5_000 };
        let cents = (scaled + half) / 10_000;
        Money::from_cents(cents.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

// Arithmetic saturates rather than wrapping or panicking.

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::from_cents(self.amount_cents.saturating_add(rhs.amount_cents))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::from_cents(self.amount_cents.saturating_sub(rhs.amount_cents))
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, quantity: u32) -> Money {
        Money::from_cents(self.amount_cents.saturating_mul(quantity as i64))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_cents < 0 { "-" } else { "" };
        let abs = self.amount_cents.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_major() {
        let money = Money::from_major(10);
        assert_eq!(money.to_cents(), 1000);
        assert_eq!(money.to_major(), 10.0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(format!("{}", Money::from_major(10)), "10.00");
        assert_eq!(format!("{}", Money::from_cents(2805)), "28.05");
        assert_eq!(format!("{}", Money::from_cents(-150)), "-1.50");
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 14% of 0.25 = 0.035 -> 0.04
        assert_eq!(Money::from_cents(25).apply_rate_bps(1400), Money::from_cents(4));
        // 14% of 0.10 = 0.014 -> 0.01
        assert_eq!(Money::from_cents(10).apply_rate_bps(1400), Money::from_cents(1));
        assert_eq!(Money::from_major(200).apply_rate_bps(1400), Money::from_major(28));
    }

    #[test]
    fn test_money_arithmetic() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)].into_iter().sum();
        assert_eq!(total, Money::from_cents(400));
        assert_eq!(Money::from_cents(150) * 3, Money::from_cents(450));
        assert_eq!(Money::from_cents(100) - Money::from_cents(150), Money::from_cents(-50));
    }

    #[test]
    fn test_money_arithmetic_saturates() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max + Money::from_cents(1), max);
        assert_eq!(max * u32::MAX, max);
        let min = Money::from_cents(i64::MIN);
        assert_eq!(min - Money::from_cents(1), min);
        assert_eq!(max.apply_rate_bps(20_000), max);
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!("cart".parse::<OrderStatus>().unwrap(), OrderStatus::Cart);
        assert_eq!(PharmacyStatus::Active.to_string(), "active");
        assert!("closed".parse::<PharmacyStatus>().is_err());
        assert_eq!("wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::Wallet);
    }

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::QuantityLimitExceeded).unwrap();
        assert_eq!(json, "\"quantity_limit_exceeded\"");
        assert_eq!(ErrorCode::CartNotFound.to_string(), "cart_not_found");
    }
}
