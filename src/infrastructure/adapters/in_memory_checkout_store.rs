use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    Cart, CartLine, Customer, LockMode, Medicine, Money, NewOrder, Order, OrderStatus, Pharmacy,
    PrescriptionUpload, StockBatch, TransientFault,
};
use crate::ports::{CheckoutStorePort, CheckoutTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

/// Row identity for the lock registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Cart(i64),
    Stock(i64),
}

/// Cart line as stored; name and current price are joined at read time
#[derive(Debug, Clone)]
struct StoredLine {
    id: i64,
    medicine_id: i64,
    quantity: u32,
    price_at_time: Money,
}

#[derive(Debug, Clone)]
struct StoredCart {
    id: i64,
    user_id: i64,
    pharmacy_id: i64,
    lines: Vec<StoredLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    medicines: HashMap<i64, Medicine>,
    pharmacies: HashMap<i64, Pharmacy>,
    customers: HashMap<i64, Customer>,
    carts: BTreeMap<i64, StoredCart>,
    stock: BTreeMap<i64, StockBatch>,
    orders: BTreeMap<i64, Order>,
    uploads: Vec<PrescriptionUpload>,
}

impl Tables {
    fn stock_id(&self, pharmacy_id: i64, medicine_id: i64) -> Option<i64> {
        self.stock
            .values()
            .find(|s| s.pharmacy_id == pharmacy_id && s.medicine_id == medicine_id)
            .map(|s| s.id)
    }

    fn load_cart(&self, stored: &StoredCart) -> Cart {
        let lines = stored
            .lines
            .iter()
            .map(|line| {
                let medicine = self.medicines.get(&line.medicine_id);
                CartLine {
                    id: line.id,
                    medicine_id: line.medicine_id,
                    medicine_name: medicine.map(|m| m.brand_name.clone()),
                    quantity: line.quantity,
                    price_at_time: line.price_at_time,
                    current_price: medicine.and_then(|m| m.price),
                }
            })
            .collect();

        Cart {
            id: stored.id,
            user_id: stored.user_id,
            pharmacy_id: stored.pharmacy_id,
            status: OrderStatus::Cart,
            lines,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

/// Scripted faults, consumed as they fire
#[derive(Debug, Default)]
struct Faults {
    order_insert_failures: u32,
    stock_lock_deadlocks: u32,
    commit_deadlocks: u32,
    cart_delete_failures: u32,
    fail_stock_increments: bool,
}

struct Shared {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    row_locks: Mutex<HashMap<RowKey, Arc<RwLock<()>>>>,
    next_id: AtomicI64,
    lock_wait_timeout: Duration,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, key: RowKey) -> Arc<RwLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Cart to seed into an [`InMemoryCheckoutStore`]
#[derive(Debug, Clone)]
pub struct SeedCart {
    user_id: i64,
    pharmacy_id: i64,
    lines: Vec<(i64, u32, Money)>,
    updated_at: DateTime<Utc>,
}

impl SeedCart {
    pub fn new(user_id: i64, pharmacy_id: i64) -> Self {
        Self {
            user_id,
            pharmacy_id,
            lines: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add a line with the price captured when it was added
    pub fn line(mut self, medicine_id: i64, quantity: u32, price_at_time: Money) -> Self {
        self.lines.push((medicine_id, quantity, price_at_time));
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }
}

/// Transactional in-process store.
///
/// Row locks follow InnoDB semantics closely enough for checkout: shared
/// and exclusive locks per cart and stock row, held until the transaction
/// ends, with a bounded lock wait that fails as a transient fault. Writes
/// stay private to their transaction until commit.
#[derive(Clone)]
pub struct InMemoryCheckoutStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryCheckoutStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl InMemoryCheckoutStore {
    pub fn new(lock_wait_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                faults: Mutex::new(Faults::default()),
                row_locks: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(1),
                lock_wait_timeout,
            }),
        }
    }

    pub fn add_medicine(&self, id: i64, brand_name: &str, price: Option<Money>) {
        self.shared.tables().medicines.insert(
            id,
            Medicine {
                id,
                brand_name: brand_name.to_string(),
                price,
            },
        );
    }

    pub fn add_pharmacy(&self, pharmacy: Pharmacy) {
        self.shared.tables().pharmacies.insert(pharmacy.id, pharmacy);
    }

    pub fn add_customer(&self, customer: Customer) {
        self.shared.tables().customers.insert(customer.id, customer);
    }

    /// Seed a stock row; returns its id
    pub fn add_stock(&self, pharmacy_id: i64, medicine_id: i64, quantity: u32) -> i64 {
        let id = self.shared.next_id();
        self.shared.tables().stock.insert(
            id,
            StockBatch {
                id,
                pharmacy_id,
                medicine_id,
                quantity,
            },
        );
        id
    }

    /// Seed a cart; returns its id
    pub fn add_cart(&self, seed: SeedCart) -> i64 {
        let id = self.shared.next_id();
        let lines = seed
            .lines
            .into_iter()
            .map(|(medicine_id, quantity, price_at_time)| StoredLine {
                id: self.shared.next_id(),
                medicine_id,
                quantity,
                price_at_time,
            })
            .collect();

        self.shared.tables().carts.insert(
            id,
            StoredCart {
                id,
                user_id: seed.user_id,
                pharmacy_id: seed.pharmacy_id,
                lines,
                created_at: seed.updated_at,
                updated_at: seed.updated_at,
            },
        );
        id
    }

    pub fn set_medicine_price(&self, medicine_id: i64, price: Option<Money>) {
        if let Some(medicine) = self.shared.tables().medicines.get_mut(&medicine_id) {
            medicine.price = price;
        }
    }

    pub fn set_stock_quantity(&self, pharmacy_id: i64, medicine_id: i64, quantity: u32) {
        let mut tables = self.shared.tables();
        if let Some(id) = tables.stock_id(pharmacy_id, medicine_id) {
            if let Some(stock) = tables.stock.get_mut(&id) {
                stock.quantity = quantity;
            }
        }
    }

    /// Committed quantity of a stock row
    pub fn stock_quantity(&self, pharmacy_id: i64, medicine_id: i64) -> Option<u32> {
        let tables = self.shared.tables();
        tables
            .stock_id(pharmacy_id, medicine_id)
            .and_then(|id| tables.stock.get(&id))
            .map(|s| s.quantity)
    }

    pub fn cart_exists(&self, cart_id: i64) -> bool {
        self.shared.tables().carts.contains_key(&cart_id)
    }

    /// Committed orders, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.shared.tables().orders.values().cloned().collect()
    }

    pub fn prescription_uploads(&self) -> Vec<PrescriptionUpload> {
        self.shared.tables().uploads.clone()
    }
}

/// Fault injection, compiled only for tests and the `test-util` feature
#[cfg(any(test, feature = "test-util"))]
impl InMemoryCheckoutStore {
    /// Make the next `count` order inserts fail with a constraint violation
    pub fn fail_order_inserts(&self, count: u32) {
        self.shared.faults().order_insert_failures = count;
    }

    /// Make the next `count` stock locks fail as deadlock victims
    pub fn inject_stock_lock_deadlocks(&self, count: u32) {
        self.shared.faults().stock_lock_deadlocks = count;
    }

    /// Make the next `count` commits fail as deadlock victims
    pub fn inject_commit_deadlocks(&self, count: u32) {
        self.shared.faults().commit_deadlocks = count;
    }

    /// Make the next `count` cart deletions fail with an internal error
    pub fn fail_cart_deletes(&self, count: u32) {
        self.shared.faults().cart_delete_failures = count;
    }

    pub fn fail_stock_increments(&self, fail: bool) {
        self.shared.faults().fail_stock_increments = fail;
    }
}

#[async_trait]
impl CheckoutStorePort for InMemoryCheckoutStore {
    async fn begin(&self) -> DomainResult<Box<dyn CheckoutTransaction>> {
        Ok(Box::new(InMemoryCheckoutTransaction {
            shared: self.shared.clone(),
            held: HashMap::new(),
            stock_writes: HashMap::new(),
            new_orders: Vec::new(),
            new_uploads: Vec::new(),
            deleted_carts: HashSet::new(),
        }))
    }
}

enum HeldLock {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Transaction over [`InMemoryCheckoutStore`]. Dropping it discards its
/// writes and releases its locks.
pub struct InMemoryCheckoutTransaction {
    shared: Arc<Shared>,
    held: HashMap<RowKey, HeldLock>,
    stock_writes: HashMap<i64, u32>,
    new_orders: Vec<Order>,
    new_uploads: Vec<PrescriptionUpload>,
    deleted_carts: HashSet<i64>,
}

impl InMemoryCheckoutTransaction {
    async fn acquire(&mut self, key: RowKey, mode: LockMode) -> DomainResult<()> {
        match (self.held.get(&key), mode) {
            (Some(HeldLock::Exclusive(_)), _) | (Some(HeldLock::Shared(_)), LockMode::Shared) => {
                return Ok(());
            }
            (Some(HeldLock::Shared(_)), LockMode::Exclusive) => {
                return Err(DomainError::transient(
                    TransientFault::Deadlock,
                    format!("lock upgrade on {:?}", key),
                ));
            }
            (None, _) => {}
        }

        let lock = self.shared.row_lock(key);
        let timeout = self.shared.lock_wait_timeout;
        let wait_failed = || {
            DomainError::transient(
                TransientFault::LockWaitTimeout,
                format!("lock wait timeout exceeded on {:?}", key),
            )
        };

        let held = match mode {
            LockMode::Shared => HeldLock::Shared(
                tokio::time::timeout(timeout, lock.read_owned())
                    .await
                    .map_err(|_| wait_failed())?,
            ),
            LockMode::Exclusive => HeldLock::Exclusive(
                tokio::time::timeout(timeout, lock.write_owned())
                    .await
                    .map_err(|_| wait_failed())?,
            ),
        };

        self.held.insert(key, held);
        Ok(())
    }

    fn visible_stock(&self, stock_id: i64) -> Option<StockBatch> {
        let mut stock = self.shared.tables().stock.get(&stock_id).cloned()?;
        if let Some(quantity) = self.stock_writes.get(&stock_id) {
            stock.quantity = *quantity;
        }
        Some(stock)
    }
}

#[async_trait]
impl CheckoutTransaction for InMemoryCheckoutTransaction {
    async fn lock_cart(
        &mut self,
        cart_id: i64,
        user_id: i64,
        mode: LockMode,
    ) -> DomainResult<Option<Cart>> {
        self.acquire(RowKey::Cart(cart_id), mode).await?;

        if self.deleted_carts.contains(&cart_id) {
            return Ok(None);
        }

        let tables = self.shared.tables();
        Ok(tables
            .carts
            .get(&cart_id)
            .filter(|cart| cart.user_id == user_id)
            .map(|cart| tables.load_cart(cart)))
    }

    async fn find_pharmacy(&mut self, pharmacy_id: i64) -> DomainResult<Option<Pharmacy>> {
        Ok(self.shared.tables().pharmacies.get(&pharmacy_id).cloned())
    }

    async fn find_customer(&mut self, user_id: i64) -> DomainResult<Option<Customer>> {
        Ok(self.shared.tables().customers.get(&user_id).cloned())
    }

    async fn find_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>> {
        let stock_id = self.shared.tables().stock_id(pharmacy_id, medicine_id);
        Ok(stock_id.and_then(|id| self.visible_stock(id)))
    }

    async fn lock_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>> {
        {
            let mut faults = self.shared.faults();
            if faults.stock_lock_deadlocks > 0 {
                faults.stock_lock_deadlocks -= 1;
                return Err(DomainError::transient(
                    TransientFault::Deadlock,
                    "deadlock found when trying to get lock",
                ));
            }
        }

        let Some(stock_id) = self.shared.tables().stock_id(pharmacy_id, medicine_id) else {
            return Ok(None);
        };
        self.acquire(RowKey::Stock(stock_id), LockMode::Exclusive).await?;

        Ok(self.visible_stock(stock_id))
    }

    async fn decrement_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()> {
        self.acquire(RowKey::Stock(stock_id), LockMode::Exclusive).await?;

        let stock = self
            .visible_stock(stock_id)
            .ok_or_else(|| DomainError::not_found("Stock batch", stock_id))?;
        let remaining = stock.quantity.checked_sub(quantity).ok_or_else(|| {
            DomainError::ConstraintViolation(format!(
                "stock {} cannot be decremented by {}",
                stock_id, quantity
            ))
        })?;

        self.stock_writes.insert(stock_id, remaining);
        Ok(())
    }

    async fn increment_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()> {
        if self.shared.faults().fail_stock_increments {
            return Err(DomainError::Internal(format!(
                "stock {} increment refused",
                stock_id
            )));
        }

        self.acquire(RowKey::Stock(stock_id), LockMode::Exclusive).await?;

        let stock = self
            .visible_stock(stock_id)
            .ok_or_else(|| DomainError::not_found("Stock batch", stock_id))?;
        let restored = stock.quantity.checked_add(quantity).ok_or_else(|| {
            DomainError::ConstraintViolation(format!("stock {} overflow", stock_id))
        })?;

        self.stock_writes.insert(stock_id, restored);
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> DomainResult<Order> {
        {
            let mut faults = self.shared.faults();
            if faults.order_insert_failures > 0 {
                faults.order_insert_failures -= 1;
                return Err(DomainError::ConstraintViolation(
                    "order insert rejected".to_string(),
                ));
            }
        }

        let order_id = self.shared.next_id();
        let line_ids: Vec<i64> = order.lines.iter().map(|_| self.shared.next_id()).collect();
        let order = order.into_order(order_id, &line_ids, Utc::now());

        self.new_orders.push(order.clone());
        Ok(order)
    }

    async fn insert_prescription_upload(
        &mut self,
        order_id: i64,
        file_path: &str,
    ) -> DomainResult<PrescriptionUpload> {
        let upload = PrescriptionUpload {
            id: self.shared.next_id(),
            order_id,
            file_path: file_path.to_string(),
            ocr_text: None,
            validated_by_doctor: false,
            created_at: Utc::now(),
        };

        self.new_uploads.push(upload.clone());
        Ok(upload)
    }

    async fn delete_cart(&mut self, cart_id: i64) -> DomainResult<()> {
        {
            let mut faults = self.shared.faults();
            if faults.cart_delete_failures > 0 {
                faults.cart_delete_failures -= 1;
                return Err(DomainError::Internal(format!(
                    "cart {} delete refused",
                    cart_id
                )));
            }
        }

        self.acquire(RowKey::Cart(cart_id), LockMode::Exclusive).await?;

        let exists = self.shared.tables().carts.contains_key(&cart_id);
        if self.deleted_carts.contains(&cart_id) || !exists {
            return Err(DomainError::not_found("Cart", cart_id));
        }

        self.deleted_carts.insert(cart_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        {
            let mut faults = self.shared.faults();
            if faults.commit_deadlocks > 0 {
                faults.commit_deadlocks -= 1;
                return Err(DomainError::transient(
                    TransientFault::Deadlock,
                    "deadlock found at commit",
                ));
            }
        }

        // Apply writes before the locks are released with `self`
        let mut tables = self.shared.tables();
        for (stock_id, quantity) in &self.stock_writes {
            if let Some(stock) = tables.stock.get_mut(stock_id) {
                stock.quantity = *quantity;
            }
        }
        for cart_id in &self.deleted_carts {
            tables.carts.remove(cart_id);
        }
        for order in &self.new_orders {
            tables.orders.insert(order.id, order.clone());
        }
        tables.uploads.extend(self.new_uploads.iter().cloned());
        drop(tables);

        debug!(
            orders = self.new_orders.len(),
            stock_rows = self.stock_writes.len(),
            "In-memory transaction committed"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DomainResult<()> {
        Ok(())
    }
}
