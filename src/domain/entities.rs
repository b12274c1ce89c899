use crate::domain::value_objects::{Money, OrderStatus, PaymentMethod, PharmacyStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Medicine catalogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,

    /// Brand name shown to buyers
    pub brand_name: String,

    /// Current listed price; `None` when the medicine is not priced
    pub price: Option<Money>,
}

/// Pharmacy profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: i64,

    /// Display name
    pub name: Option<String>,

    /// Street address
    pub location: Option<String>,

    /// Phone or other contact line
    pub contact_info: Option<String>,

    /// Verified by the marketplace
    pub verified: bool,

    /// Operating status
    pub status: PharmacyStatus,
}

impl Pharmacy {
    /// Whether the pharmacy currently accepts orders
    pub fn is_active(&self) -> bool {
        self.status == PharmacyStatus::Active
    }
}

/// Buyer account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,

    pub email: String,

    /// When the email address was confirmed
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn has_verified_email(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Line of a cart, joined with the medicine it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,

    pub medicine_id: i64,

    /// Medicine brand name at load time
    pub medicine_name: Option<String>,

    pub quantity: u32,

    /// Unit price captured when the line was added
    pub price_at_time: Money,

    /// Unit price currently listed for the medicine
    pub current_price: Option<Money>,
}

impl CartLine {
    pub fn display_name(&self) -> &str {
        self.medicine_name.as_deref().unwrap_or("Unknown")
    }

    /// Line subtotal at the captured price
    pub fn subtotal(&self) -> Money {
        self.price_at_time * self.quantity
    }
}

/// Cart: an order row with status `cart`, scoped to one pharmacy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,

    /// Owner
    pub user_id: i64,

    /// Every line belongs to this pharmacy
    pub pharmacy_id: i64,

    pub status: OrderStatus,

    /// Lines in insertion order
    pub lines: Vec<CartLine>,

    pub created_at: DateTime<Utc>,

    /// Last add/remove; drives expiry
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Available quantity of one medicine at one pharmacy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: i64,

    pub pharmacy_id: i64,

    pub medicine_id: i64,

    /// Never negative
    pub quantity: u32,
}

impl StockBatch {
    pub fn can_fulfil(&self, requested: u32) -> bool {
        self.quantity >= requested
    }
}

/// Pricing breakdown of a set of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total_items: u64,
    pub total_amount: Money,
}

/// Order line with a frozen unit price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub medicine_id: i64,
    pub quantity: u32,
    pub price_at_time: Money,
}

/// Order line not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub medicine_id: i64,
    pub quantity: u32,
    pub price_at_time: Money,
}

/// Order not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: i64,
    pub pharmacy_id: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub totals: OrderTotals,
    pub currency: String,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Attach the identifiers assigned by the store
    pub fn into_order(self, id: i64, line_ids: &[i64], created_at: DateTime<Utc>) -> Order {
        let lines = self
            .lines
            .into_iter()
            .zip(line_ids.iter().copied())
            .map(|(line, line_id)| OrderLine {
                id: line_id,
                medicine_id: line.medicine_id,
                quantity: line.quantity,
                price_at_time: line.price_at_time,
            })
            .collect();

        Order {
            id,
            user_id: self.user_id,
            pharmacy_id: self.pharmacy_id,
            status: self.status,
            payment_method: self.payment_method,
            billing_address: self.billing_address,
            shipping_address: self.shipping_address,
            totals: self.totals,
            currency: self.currency,
            lines,
            created_at,
        }
    }
}

/// Placed order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,

    pub user_id: i64,

    pub pharmacy_id: i64,

    /// `pending` on creation
    pub status: OrderStatus,

    pub payment_method: PaymentMethod,

    pub billing_address: Option<String>,

    pub shipping_address: Option<String>,

    pub totals: OrderTotals,

    /// ISO currency code
    pub currency: String,

    pub lines: Vec<OrderLine>,

    pub created_at: DateTime<Utc>,
}

/// Prescription image attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionUpload {
    pub id: i64,

    pub order_id: i64,

    /// Path returned by the storage collaborator
    pub file_path: String,

    /// Filled in later by OCR
    pub ocr_text: Option<String>,

    /// Filled in later by a doctor
    pub validated_by_doctor: bool,

    pub created_at: DateTime<Utc>,
}
