use crate::domain::errors::DomainResult;
use crate::domain::{
    Cart, Customer, LockMode, NewOrder, Order, Pharmacy, PrescriptionUpload, StockBatch,
};
use async_trait::async_trait;

/// Entry point to the relational store backing checkout.
#[async_trait]
pub trait CheckoutStorePort: Send + Sync {
    /// Open a new atomic unit of work
    async fn begin(&self) -> DomainResult<Box<dyn CheckoutTransaction>>;
}

/// One atomic checkout attempt.
///
/// The transaction is the lock scope: every row lock taken through it is
/// held until `commit` or `rollback`, and dropping it without either rolls
/// back and releases the locks.
#[async_trait]
pub trait CheckoutTransaction: Send {
    /// Load a cart with status `cart` owned by `user_id`, locking its row.
    ///
    /// Blocks while another transaction holds a conflicting lock on it.
    async fn lock_cart(
        &mut self,
        cart_id: i64,
        user_id: i64,
        mode: LockMode,
    ) -> DomainResult<Option<Cart>>;

    async fn find_pharmacy(&mut self, pharmacy_id: i64) -> DomainResult<Option<Pharmacy>>;

    async fn find_customer(&mut self, user_id: i64) -> DomainResult<Option<Customer>>;

    /// Non-locking read of a stock row
    async fn find_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>>;

    /// Exclusive-lock a stock row and read it
    async fn lock_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>>;

    /// Subtract from a stock row. Fails with `ConstraintViolation` rather
    /// than letting the quantity go negative.
    async fn decrement_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()>;

    /// Add back to a stock row
    async fn increment_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()>;

    /// Insert an order with its lines
    async fn insert_order(&mut self, order: NewOrder) -> DomainResult<Order>;

    async fn insert_prescription_upload(
        &mut self,
        order_id: i64,
        file_path: &str,
    ) -> DomainResult<PrescriptionUpload>;

    /// Delete a cart and its lines
    async fn delete_cart(&mut self, cart_id: i64) -> DomainResult<()>;

    async fn commit(self: Box<Self>) -> DomainResult<()>;

    async fn rollback(self: Box<Self>) -> DomainResult<()>;
}
