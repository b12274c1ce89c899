use crate::domain::errors::DomainResult;
use crate::domain::Cart;
use crate::ports::CheckoutTransaction;
use serde::Serialize;
use tracing::{debug, error, warn};

/// One successful stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReservedItem {
    pub stock_id: i64,
    pub medicine_id: i64,
    pub quantity: u32,
}

/// Append-only log of the decrements made in one checkout attempt.
///
/// Each entry's inverse is an increment of the same amount; `release`
/// replays the inverses newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReservationRecord {
    items: Vec<ReservedItem>,
}

impl ReservationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ReservedItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[ReservedItem] {
        &self.items
    }

    /// Restore every reserved quantity.
    ///
    /// Best effort: each restoration is tried on its own and a failure is
    /// logged without stopping the rest. Returns how many failed.
    pub async fn release(&self, tx: &mut dyn CheckoutTransaction) -> usize {
        let mut failures = 0;

        for item in self.items.iter().rev() {
            match tx.increment_stock(item.stock_id, item.quantity).await {
                Ok(()) => {
                    debug!(
                        stock_id = item.stock_id,
                        quantity = item.quantity,
                        "Released reserved stock"
                    );
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        stock_id = item.stock_id,
                        medicine_id = item.medicine_id,
                        "Failed to release stock: {}",
                        e
                    );
                }
            }
        }

        failures
    }
}

/// Result of a reservation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Every line was decremented
    Reserved(ReservationRecord),
    /// A line could not be supplied; earlier lines were already released
    Rejected { message: String },
}

/// Authoritative, locked stock check and decrement for a whole cart
#[derive(Debug, Clone, Copy, Default)]
pub struct ReservationCoordinator;

impl ReservationCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Lock and decrement the stock row of every cart line, in cart order.
    ///
    /// On the first line that is missing or short, the lines reserved so far
    /// are released before returning `Rejected`. A store error also releases
    /// the partial reservation before it propagates.
    pub async fn reserve(
        &self,
        tx: &mut dyn CheckoutTransaction,
        cart: &Cart,
    ) -> DomainResult<ReservationOutcome> {
        let mut record = ReservationRecord::new();

        for line in &cart.lines {
            let stock = match tx.lock_stock(cart.pharmacy_id, line.medicine_id).await {
                Ok(stock) => stock,
                Err(e) => {
                    record.release(tx).await;
                    return Err(e);
                }
            };

            let stock = match stock {
                Some(stock) if stock.can_fulfil(line.quantity) => stock,
                Some(stock) => {
                    warn!(
                        cart_id = cart.id,
                        medicine_id = line.medicine_id,
                        available = stock.quantity,
                        required = line.quantity,
                        "Insufficient stock at reservation"
                    );
                    record.release(tx).await;
                    return Ok(ReservationOutcome::Rejected {
                        message: format!(
                            "Insufficient stock for {}. Available: {}, Required: {}",
                            line.display_name(),
                            stock.quantity,
                            line.quantity
                        ),
                    });
                }
                None => {
                    warn!(
                        cart_id = cart.id,
                        medicine_id = line.medicine_id,
                        "Stock row missing at reservation"
                    );
                    record.release(tx).await;
                    return Ok(ReservationOutcome::Rejected {
                        message: format!("Medicine {} is no longer available", line.display_name()),
                    });
                }
            };

            if let Err(e) = tx.decrement_stock(stock.id, line.quantity).await {
                record.release(tx).await;
                return Err(e);
            }

            record.push(ReservedItem {
                stock_id: stock.id,
                medicine_id: line.medicine_id,
                quantity: line.quantity,
            });
        }

        debug!(cart_id = cart.id, lines = record.items().len(), "Stock reserved");
        Ok(ReservationOutcome::Reserved(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::{LockMode, Money, TransientFault};
    use crate::infrastructure::adapters::{InMemoryCheckoutStore, SeedCart};
    use crate::ports::CheckoutStorePort;

    const PHARMACY: i64 = 1;
    const USER: i64 = 7;

    fn store() -> InMemoryCheckoutStore {
        let store = InMemoryCheckoutStore::default();
        store.add_medicine(10, "Panadol", Some(Money::from_major(50)));
        store.add_medicine(11, "Augmentin", Some(Money::from_major(150)));
        store.add_stock(PHARMACY, 10, 5);
        store.add_stock(PHARMACY, 11, 1);
        store
    }

    async fn locked_cart(
        store: &InMemoryCheckoutStore,
        seed: SeedCart,
    ) -> (Box<dyn CheckoutTransaction>, Cart) {
        let cart_id = store.add_cart(seed);
        let mut tx = store.begin().await.unwrap();
        let cart = tx
            .lock_cart(cart_id, USER, LockMode::Exclusive)
            .await
            .unwrap()
            .unwrap();
        (tx, cart)
    }

    #[tokio::test]
    async fn test_reserve_decrements_every_line() {
        let store = store();
        let seed = SeedCart::new(USER, PHARMACY)
            .line(10, 2, Money::from_major(50))
            .line(11, 1, Money::from_major(150));
        let (mut tx, cart) = locked_cart(&store, seed).await;

        let outcome = ReservationCoordinator::new()
            .reserve(tx.as_mut(), &cart)
            .await
            .unwrap();

        let ReservationOutcome::Reserved(record) = outcome else {
            panic!("expected reservation");
        };
        assert_eq!(record.items().len(), 2);
        tx.commit().await.unwrap();
        assert_eq!(store.stock_quantity(PHARMACY, 10), Some(3));
        assert_eq!(store.stock_quantity(PHARMACY, 11), Some(0));
    }

    #[tokio::test]
    async fn test_short_line_releases_earlier_lines() {
        let store = store();
        let seed = SeedCart::new(USER, PHARMACY)
            .line(10, 2, Money::from_major(50))
            .line(11, 3, Money::from_major(150));
        let (mut tx, cart) = locked_cart(&store, seed).await;

        let outcome = ReservationCoordinator::new()
            .reserve(tx.as_mut(), &cart)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReservationOutcome::Rejected {
                message: "Insufficient stock for Augmentin. Available: 1, Required: 3".to_string()
            }
        );
        assert_eq!(tx.find_stock(PHARMACY, 10).await.unwrap().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_missing_stock_row_is_no_longer_available() {
        let store = store();
        store.add_medicine(12, "Brufen", Some(Money::from_major(20)));
        let seed = SeedCart::new(USER, PHARMACY).line(12, 1, Money::from_major(20));
        let (mut tx, cart) = locked_cart(&store, seed).await;

        let outcome = ReservationCoordinator::new()
            .reserve(tx.as_mut(), &cart)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReservationOutcome::Rejected {
                message: "Medicine Brufen is no longer available".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_deadlock_propagates_without_decrementing() {
        let store = store();
        let seed = SeedCart::new(USER, PHARMACY)
            .line(10, 2, Money::from_major(50))
            .line(11, 1, Money::from_major(150));
        let (mut tx, cart) = locked_cart(&store, seed).await;
        store.inject_stock_lock_deadlocks(1);

        let result = ReservationCoordinator::new().reserve(tx.as_mut(), &cart).await;

        assert!(matches!(
            result,
            Err(DomainError::Transient {
                fault: TransientFault::Deadlock,
                ..
            })
        ));
        assert_eq!(tx.find_stock(PHARMACY, 10).await.unwrap().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_release_is_best_effort() {
        let store = store();
        let seed = SeedCart::new(USER, PHARMACY)
            .line(10, 2, Money::from_major(50))
            .line(11, 1, Money::from_major(150));
        let (mut tx, cart) = locked_cart(&store, seed).await;

        let ReservationOutcome::Reserved(record) = ReservationCoordinator::new()
            .reserve(tx.as_mut(), &cart)
            .await
            .unwrap()
        else {
            panic!("expected reservation");
        };
        store.fail_stock_increments(true);

        let failures = record.release(tx.as_mut()).await;

        assert_eq!(failures, 2);
    }
}
