use crate::domain::{CartLine, CheckoutPolicy, Money, OrderTotals};

/// Price a set of cart lines.
///
/// Pure: depends only on the captured prices and quantities of `lines` and
/// on the policy's tax rate and shipping fee. Shipping is flat and is
/// charged even for an empty set.
pub fn calculate_order_totals(lines: &[CartLine], policy: &CheckoutPolicy) -> OrderTotals {
    let subtotal: Money = lines.iter().map(CartLine::subtotal).sum();
    let total_items = lines.iter().map(|line| u64::from(line.quantity)).sum();
    let tax = subtotal.apply_rate_bps(policy.tax_rate_bps);
    let shipping = policy.shipping_fee;

    OrderTotals {
        subtotal,
        tax,
        shipping,
        total_items,
        total_amount: subtotal + tax + shipping,
    }
}
