use crate::application::dto::{
    ExceededItem, PriceChangedItem, UnavailableItem, UnavailableReason, ValidationResult,
};
use crate::application::totals::calculate_order_totals;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CartLine, CheckoutPolicy, Customer, ErrorCode, LockMode, Pharmacy};
use crate::ports::{CartExpiryPolicy, CheckoutTransaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Read-only cart checks run before any stock is touched.
///
/// Steps short-circuit in a fixed order. The stock/price and quantity-limit
/// steps collect every offending line before failing.
#[derive(Clone)]
pub struct CartValidator {
    policy: Arc<CheckoutPolicy>,
    expiry: Arc<dyn CartExpiryPolicy>,
}

impl CartValidator {
    pub fn new(policy: Arc<CheckoutPolicy>, expiry: Arc<dyn CartExpiryPolicy>) -> Self {
        Self { policy, expiry }
    }

    /// Validate a cart inside `tx`, holding a `mode` lock on the cart row
    /// for the rest of the transaction. Never writes.
    pub async fn validate(
        &self,
        tx: &mut dyn CheckoutTransaction,
        cart_id: i64,
        user_id: i64,
        mode: LockMode,
        now: DateTime<Utc>,
    ) -> DomainResult<ValidationResult> {
        // 1. Cart owned by the user and still a cart
        let Some(cart) = tx.lock_cart(cart_id, user_id, mode).await? else {
            debug!(cart_id, user_id, "Cart not found for checkout");
            return Ok(ValidationResult::failure(
                ErrorCode::CartNotFound,
                "Cart not found or not accessible",
            ));
        };

        // 2. Expiry
        if self.expiry.is_expired(&cart, now) {
            return Ok(ValidationResult::failure(
                ErrorCode::CartExpired,
                "Cart has expired. Please add items again.",
            ));
        }

        // 3. Emptiness
        if cart.is_empty() {
            return Ok(ValidationResult::failure(ErrorCode::CartEmpty, "Cart is empty"));
        }

        // 4. Pharmacy eligibility
        let pharmacy = tx
            .find_pharmacy(cart.pharmacy_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Pharmacy", cart.pharmacy_id))?;
        if let Some(rejection) = check_pharmacy(&pharmacy) {
            return Ok(rejection);
        }

        // 5. Advisory stock and price check, no stock locks
        let mut available = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let stock = tx.find_stock(cart.pharmacy_id, line.medicine_id).await?;
            available.push(stock.map(|s| s.quantity));
        }
        if let Some(rejection) = check_stock_and_prices(&cart.lines, &available) {
            return Ok(rejection);
        }

        // 6. Buyer eligibility
        let customer = tx
            .find_customer(cart.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", cart.user_id))?;
        if let Some(rejection) = check_customer(&customer) {
            return Ok(rejection);
        }

        // 7. Per-medicine quantity cap
        if let Some(rejection) =
            check_quantity_limits(&cart.lines, self.policy.max_quantity_per_medicine)
        {
            return Ok(rejection);
        }

        // 8. Totals
        let totals = calculate_order_totals(&cart.lines, &self.policy);
        debug!(cart_id, total = %totals.total_amount, "Cart validated");

        Ok(ValidationResult::ready(cart, pharmacy, totals))
    }
}

/// Pharmacy must be verified and active
pub fn check_pharmacy(pharmacy: &Pharmacy) -> Option<ValidationResult> {
    if !pharmacy.verified {
        return Some(ValidationResult::failure(
            ErrorCode::PharmacyNotVerified,
            "Pharmacy is not verified",
        ));
    }

    if !pharmacy.is_active() {
        return Some(ValidationResult::failure(
            ErrorCode::PharmacyInactive,
            "Pharmacy is not currently accepting orders",
        ));
    }

    None
}

/// Compare every line with the stock level observed for it (`available`,
/// index-aligned with `lines`; `None` when no stock row exists) and with
/// the medicine's current price.
pub fn check_stock_and_prices(
    lines: &[CartLine],
    available: &[Option<u32>],
) -> Option<ValidationResult> {
    let mut unavailable_items = Vec::new();
    let mut price_changed_items = Vec::new();

    for (line, stock) in lines.iter().zip(available.iter().copied()) {
        let Some(stock_quantity) = stock else {
            unavailable_items.push(unavailable(line, 0, UnavailableReason::NotAvailable));
            continue;
        };

        // An unpriced medicine cannot be sold
        let Some(current_price) = line.current_price else {
            unavailable_items.push(unavailable(
                line,
                stock_quantity,
                UnavailableReason::NotAvailable,
            ));
            continue;
        };

        if stock_quantity < line.quantity {
            unavailable_items.push(unavailable(
                line,
                stock_quantity,
                UnavailableReason::InsufficientStock,
            ));
        }

        if current_price != line.price_at_time {
            price_changed_items.push(PriceChangedItem {
                medicine_id: line.medicine_id,
                medicine_name: line.display_name().to_string(),
                old_price: line.price_at_time,
                new_price: current_price,
                price_change: current_price - line.price_at_time,
            });
        }
    }

    if unavailable_items.is_empty() && price_changed_items.is_empty() {
        return None;
    }

    Some(ValidationResult::stock_conflicts(
        unavailable_items,
        price_changed_items,
    ))
}

/// Buyer must have a verified email address
pub fn check_customer(customer: &Customer) -> Option<ValidationResult> {
    if customer.has_verified_email() {
        return None;
    }

    Some(ValidationResult::failure(
        ErrorCode::EmailNotVerified,
        "Please verify your email address before checkout",
    ))
}

/// No line may exceed `max_per_medicine`
pub fn check_quantity_limits(
    lines: &[CartLine],
    max_per_medicine: u32,
) -> Option<ValidationResult> {
    let exceeded_items: Vec<ExceededItem> = lines
        .iter()
        .filter(|line| line.quantity > max_per_medicine)
        .map(|line| ExceededItem {
            medicine_id: line.medicine_id,
            medicine_name: line.display_name().to_string(),
            quantity: line.quantity,
            max_allowed: max_per_medicine,
        })
        .collect();

    if exceeded_items.is_empty() {
        None
    } else {
        Some(ValidationResult::quantity_limits(exceeded_items))
    }
}

fn unavailable(
    line: &CartLine,
    available_quantity: u32,
    reason: UnavailableReason,
) -> UnavailableItem {
    UnavailableItem {
        medicine_id: line.medicine_id,
        medicine_name: line.display_name().to_string(),
        requested_quantity: line.quantity,
        available_quantity,
        reason,
    }
}
