use crate::domain::{
    Cart, ErrorCode, Money, Order, OrderStatus, OrderTotals, PaymentMethod, Pharmacy,
};
use crate::ports::{PaymentResult, PrescriptionFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Checkout request data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Defaults to cash
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,

    /// Defaults to the configured currency
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub billing_address: Option<String>,

    #[serde(default)]
    pub shipping_address: Option<String>,

    /// Whether the attached prescription files should be stored
    #[serde(default)]
    pub prescription_required: bool,

    #[serde(default)]
    pub prescription_files: Vec<PrescriptionFile>,
}

/// Why a line cannot be supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotAvailable,
    InsufficientStock,
}

/// Line the pharmacy cannot supply in the requested quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableItem {
    pub medicine_id: i64,
    pub medicine_name: String,
    pub requested_quantity: u32,
    pub available_quantity: u32,
    pub reason: UnavailableReason,
}

/// Line whose listed price moved since it was added
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceChangedItem {
    pub medicine_id: i64,
    pub medicine_name: String,
    pub old_price: Money,
    pub new_price: Money,
    /// `new_price - old_price`
    pub price_change: Money,
}

/// Line above the per-medicine quantity cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceededItem {
    pub medicine_id: i64,
    pub medicine_name: String,
    pub quantity: u32,
    pub max_allowed: u32,
}

/// Validated cart snapshot passed on to reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyCart {
    pub cart: Cart,
    pub pharmacy: Pharmacy,
    pub totals: OrderTotals,
}

/// Data attached to a validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationPayload {
    None,
    Ready(ReadyCart),
    StockConflicts {
        unavailable_items: Vec<UnavailableItem>,
        price_changed_items: Vec<PriceChangedItem>,
    },
    QuantityLimits {
        exceeded_items: Vec<ExceededItem>,
    },
}

/// Outcome of a cart validation pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
    pub errors: BTreeSet<ErrorCode>,
    pub payload: ValidationPayload,
}

impl ValidationResult {
    pub fn ready(cart: Cart, pharmacy: Pharmacy, totals: OrderTotals) -> Self {
        Self {
            valid: true,
            message: "Cart is ready for checkout".to_string(),
            errors: BTreeSet::new(),
            payload: ValidationPayload::Ready(ReadyCart {
                cart,
                pharmacy,
                totals,
            }),
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            errors: BTreeSet::from([code]),
            payload: ValidationPayload::None,
        }
    }

    pub fn stock_conflicts(
        unavailable_items: Vec<UnavailableItem>,
        price_changed_items: Vec<PriceChangedItem>,
    ) -> Self {
        let mut errors = BTreeSet::new();
        for item in &unavailable_items {
            errors.insert(match item.reason {
                UnavailableReason::NotAvailable => ErrorCode::NotAvailable,
                UnavailableReason::InsufficientStock => ErrorCode::InsufficientStock,
            });
        }
        if !price_changed_items.is_empty() {
            errors.insert(ErrorCode::PriceChanged);
        }

        Self {
            valid: false,
            message: "Some items are no longer available or have price changes".to_string(),
            errors,
            payload: ValidationPayload::StockConflicts {
                unavailable_items,
                price_changed_items,
            },
        }
    }

    pub fn quantity_limits(exceeded_items: Vec<ExceededItem>) -> Self {
        Self {
            valid: false,
            message: "Some items exceed the maximum quantity limit".to_string(),
            errors: BTreeSet::from([ErrorCode::QuantityLimitExceeded]),
            payload: ValidationPayload::QuantityLimits { exceeded_items },
        }
    }

    pub fn system_error() -> Self {
        Self::failure(ErrorCode::SystemError, "Validation failed due to system error")
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.contains(&code)
    }

    pub fn ready_cart(&self) -> Option<&ReadyCart> {
        match &self.payload {
            ValidationPayload::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    pub fn into_ready_cart(self) -> Option<ReadyCart> {
        match self.payload {
            ValidationPayload::Ready(ready) => Some(ready),
            _ => None,
        }
    }
}

/// Checkout state machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    Validating,
    Reserving,
    Materializing,
    StockUpdating,
    PaymentInitiating,
    Finalizing,
    Done,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutStage::Validating => "validating",
            CheckoutStage::Reserving => "reserving",
            CheckoutStage::Materializing => "materializing",
            CheckoutStage::StockUpdating => "stock_updating",
            CheckoutStage::PaymentInitiating => "payment_initiating",
            CheckoutStage::Finalizing => "finalizing",
            CheckoutStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Checkout outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    pub success: bool,
    pub message: String,
    pub errors: BTreeSet<ErrorCode>,
    pub order: Option<Order>,
    pub order_id: Option<i64>,
    pub payment_result: Option<PaymentResult>,

    /// Stage at which a failed checkout stopped
    pub failed_stage: Option<CheckoutStage>,

    /// Validation detail when the cart was rejected
    pub validation: Option<ValidationPayload>,
}

impl CheckoutResult {
    pub fn completed(order: Order, payment_result: PaymentResult) -> Self {
        Self {
            success: true,
            message: "Checkout completed successfully".to_string(),
            errors: BTreeSet::new(),
            order_id: Some(order.id),
            order: Some(order),
            payment_result: Some(payment_result),
            failed_stage: None,
            validation: None,
        }
    }

    pub fn rejected(validation: ValidationResult) -> Self {
        Self {
            success: false,
            message: validation.message,
            errors: validation.errors,
            order: None,
            order_id: None,
            payment_result: None,
            failed_stage: Some(CheckoutStage::Validating),
            validation: Some(validation.payload),
        }
    }

    pub fn failed(stage: CheckoutStage, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: BTreeSet::from([code]),
            order: None,
            order_id: None,
            payment_result: None,
            failed_stage: Some(stage),
            validation: None,
        }
    }

    pub fn reservation_failed(reason: &str) -> Self {
        Self::failed(
            CheckoutStage::Reserving,
            ErrorCode::StockReservationFailed,
            format!("Failed to reserve stock: {}", reason),
        )
    }

    pub fn order_creation_failed() -> Self {
        Self::failed(
            CheckoutStage::Materializing,
            ErrorCode::OrderCreationFailed,
            "Failed to create order",
        )
    }

    /// Generic failure; no fault detail reaches the caller
    pub fn system_error(stage: Option<CheckoutStage>) -> Self {
        Self {
            failed_stage: stage,
            ..Self::failed(
                CheckoutStage::Validating,
                ErrorCode::SystemError,
                "Checkout failed due to system error",
            )
        }
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.contains(&code)
    }
}

/// Cart header shown on the checkout summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartInfo {
    pub id: i64,
    pub user_id: i64,
    pub pharmacy_id: i64,
    pub status: OrderStatus,
}

/// Pharmacy block shown on the checkout summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PharmacyInfo {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
}

/// Summary line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub price: Money,
    pub subtotal: Money,
}

/// Pre-checkout summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSummary {
    pub cart: CartInfo,
    pub pharmacy: PharmacyInfo,
    pub medicines: Vec<SummaryLine>,
    pub totals: OrderTotals,
    pub estimated_delivery: String,
}

impl CheckoutSummary {
    pub fn from_ready_cart(ready: &ReadyCart, estimated_delivery: &str) -> Self {
        let ReadyCart {
            cart,
            pharmacy,
            totals,
        } = ready;

        Self {
            cart: CartInfo {
                id: cart.id,
                user_id: cart.user_id,
                pharmacy_id: cart.pharmacy_id,
                status: cart.status,
            },
            pharmacy: PharmacyInfo {
                id: pharmacy.id,
                name: pharmacy
                    .name
                    .clone()
                    .or_else(|| pharmacy.location.clone())
                    .unwrap_or_else(|| "Unknown Pharmacy".to_string()),
                address: pharmacy
                    .location
                    .clone()
                    .unwrap_or_else(|| "Unknown Address".to_string()),
                phone: pharmacy
                    .contact_info
                    .clone()
                    .unwrap_or_else(|| "Unknown Phone".to_string()),
            },
            medicines: cart
                .lines
                .iter()
                .map(|line| SummaryLine {
                    id: line.medicine_id,
                    name: line.display_name().to_string(),
                    quantity: line.quantity,
                    price: line.price_at_time,
                    subtotal: line.subtotal(),
                })
                .collect(),
            totals: *totals,
            estimated_delivery: estimated_delivery.to_string(),
        }
    }
}
