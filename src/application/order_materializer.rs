use crate::application::dto::CheckoutRequest;
use crate::domain::errors::DomainResult;
use crate::domain::{
    Cart, NewOrder, NewOrderLine, Order, OrderStatus, OrderTotals, PrescriptionUpload,
};
use crate::ports::{CheckoutTransaction, PrescriptionStoragePort};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Order created from a cart, with its prescription uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedOrder {
    pub order: Order,
    pub prescription_uploads: Vec<PrescriptionUpload>,
}

impl MaterializedOrder {
    pub fn stored_files(&self) -> Vec<String> {
        self.prescription_uploads
            .iter()
            .map(|upload| upload.file_path.clone())
            .collect()
    }
}

/// Build the order a validated cart turns into.
///
/// Prices are copied from the cart lines and totals are taken as given;
/// nothing is re-read.
pub fn build_new_order(
    cart: &Cart,
    totals: &OrderTotals,
    request: &CheckoutRequest,
    default_currency: &str,
) -> NewOrder {
    NewOrder {
        user_id: cart.user_id,
        pharmacy_id: cart.pharmacy_id,
        status: OrderStatus::Pending,
        payment_method: request.payment_method.unwrap_or_default(),
        billing_address: request.billing_address.clone(),
        shipping_address: request.shipping_address.clone(),
        totals: *totals,
        currency: request
            .currency
            .clone()
            .unwrap_or_else(|| default_currency.to_string()),
        lines: cart
            .lines
            .iter()
            .map(|line| NewOrderLine {
                medicine_id: line.medicine_id,
                quantity: line.quantity,
                price_at_time: line.price_at_time,
            })
            .collect(),
    }
}

/// Persists orders and their prescription uploads
pub struct OrderMaterializer<F: PrescriptionStoragePort> {
    storage: Arc<F>,
}

impl<F: PrescriptionStoragePort> OrderMaterializer<F> {
    pub fn new(storage: Arc<F>) -> Self {
        Self { storage }
    }

    /// Insert the order and its lines, then store prescription files when
    /// the request asks for it.
    ///
    /// Files stored before a failure are discarded again before the error
    /// is returned.
    pub async fn materialize(
        &self,
        tx: &mut dyn CheckoutTransaction,
        cart: &Cart,
        totals: &OrderTotals,
        request: &CheckoutRequest,
        default_currency: &str,
    ) -> DomainResult<MaterializedOrder> {
        let new_order = build_new_order(cart, totals, request, default_currency);
        let order = tx.insert_order(new_order).await?;
        debug!(cart_id = cart.id, order_id = order.id, "Order created");

        let mut prescription_uploads = Vec::new();
        if request.prescription_required {
            let mut stored = Vec::new();
            if let Err(e) = self
                .store_prescriptions(tx, order.id, request, &mut stored, &mut prescription_uploads)
                .await
            {
                self.discard_files(&stored).await;
                return Err(e);
            }
            info!(
                order_id = order.id,
                files = prescription_uploads.len(),
                "Prescription files attached"
            );
        }

        Ok(MaterializedOrder {
            order,
            prescription_uploads,
        })
    }

    /// Remove stored files; failures are logged and skipped
    pub async fn discard_files(&self, file_paths: &[String]) {
        for path in file_paths.iter().rev() {
            if let Err(e) = self.storage.discard(path).await {
                error!(file_path = %path, "Failed to discard prescription file: {}", e);
            }
        }
    }

    async fn store_prescriptions(
        &self,
        tx: &mut dyn CheckoutTransaction,
        order_id: i64,
        request: &CheckoutRequest,
        stored: &mut Vec<String>,
        uploads: &mut Vec<PrescriptionUpload>,
    ) -> DomainResult<()> {
        for file in request.prescription_files.iter().filter(|f| f.is_valid()) {
            let path = self.storage.store(order_id, file).await?;
            stored.push(path.clone());
            uploads.push(tx.insert_prescription_upload(order_id, &path).await?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CartLine, Money, PaymentMethod};
    use chrono::Utc;

    fn cart() -> Cart {
        Cart {
            id: 5,
            user_id: 9,
            pharmacy_id: 3,
            status: OrderStatus::Cart,
            lines: vec![CartLine {
                id: 1,
                medicine_id: 40,
                medicine_name: Some("Augmentin".to_string()),
                quantity: 2,
                price_at_time: Money::from_major(100),
                current_price: Some(Money::from_major(120)),
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn totals() -> OrderTotals {
        OrderTotals {
            subtotal: Money::from_major(200),
            tax: Money::from_major(28),
            shipping: Money::from_major(30),
            total_items: 2,
            total_amount: Money::from_major(258),
        }
    }

    #[test]
    fn test_build_new_order_freezes_captured_prices() {
        let order = build_new_order(&cart(), &totals(), &CheckoutRequest::default(), "EGP");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines[0].price_at_time, Money::from_major(100));
        assert_eq!(order.totals.total_amount, Money::from_major(258));
        assert_eq!(order.payment_method, PaymentMethod::Cash);
        assert_eq!(order.currency, "EGP");
    }

    #[test]
    fn test_build_new_order_uses_request_data() {
        let request = CheckoutRequest {
            payment_method: Some(PaymentMethod::Card),
            currency: Some("USD".to_string()),
            shipping_address: Some("5 Tahrir Sq".to_string()),
            ..CheckoutRequest::default()
        };

        let order = build_new_order(&cart(), &totals(), &request, "EGP");

        assert_eq!(order.payment_method, PaymentMethod::Card);
        assert_eq!(order.currency, "USD");
        assert_eq!(order.shipping_address.as_deref(), Some("5 Tahrir Sq"));
        assert_eq!(order.billing_address, None);
    }
}
