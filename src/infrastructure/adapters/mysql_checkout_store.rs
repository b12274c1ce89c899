use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    Cart, CartLine, Customer, LockMode, Money, NewOrder, Order, OrderStatus, Pharmacy,
    PrescriptionUpload, StockBatch,
};
use crate::ports::{CheckoutStorePort, CheckoutTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// MySQL checkout store
#[derive(Clone)]
pub struct MySqlCheckoutStore {
    pool: Arc<Pool<MySql>>,
    lock_wait_timeout: Duration,
}

impl MySqlCheckoutStore {
    pub fn new(pool: Arc<Pool<MySql>>, lock_wait_timeout: Duration) -> Self {
        Self {
            pool,
            lock_wait_timeout,
        }
    }
}

#[async_trait]
impl CheckoutStorePort for MySqlCheckoutStore {
    async fn begin(&self) -> DomainResult<Box<dyn CheckoutTransaction>> {
        let mut tx = self.pool.begin().await?;

        // A stuck lock surfaces as error 1205, which is retryable
        let query = format!(
            "SET SESSION innodb_lock_wait_timeout = {}",
            self.lock_wait_timeout.as_secs().max(1)
        );
        sqlx::query(&query).execute(&mut *tx).await?;

        Ok(Box::new(MySqlCheckoutTransaction { tx }))
    }
}

/// One InnoDB transaction. Dropping it rolls back.
pub struct MySqlCheckoutTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl CheckoutTransaction for MySqlCheckoutTransaction {
    /// Lock and load a cart
    async fn lock_cart(
        &mut self,
        cart_id: i64,
        user_id: i64,
        mode: LockMode,
    ) -> DomainResult<Option<Cart>> {
        let lock_clause = match mode {
            LockMode::Shared => "LOCK IN SHARE MODE",
            LockMode::Exclusive => "FOR UPDATE",
        };
        let query = format!(
            r#"
            SELECT id, user_id, pharmacy_id, status, created_at, updated_at
            FROM orders
            WHERE id = ? AND user_id = ? AND status = 'cart'
            {}
            "#,
            lock_clause
        );

        let Some(row) = sqlx::query_as::<_, CartRow>(&query)
            .bind(cart_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT om.id, om.medicine_id, om.quantity, om.price_at_time_cents,
                   m.brand_name, m.price_cents
            FROM order_medicines om
            LEFT JOIN medicines m ON m.id = om.medicine_id
            WHERE om.order_id = ?
            ORDER BY om.id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!(cart_id, lines = lines.len(), "Cart locked");
        Ok(Some(row.into_cart(lines)?))
    }

    /// Find a pharmacy
    async fn find_pharmacy(&mut self, pharmacy_id: i64) -> DomainResult<Option<Pharmacy>> {
        let row = sqlx::query_as::<_, PharmacyRow>(
            r#"
            SELECT id, name, location, contact_info, verified, status
            FROM pharmacy_profiles
            WHERE id = ?
            "#,
        )
        .bind(pharmacy_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PharmacyRow::into_pharmacy).transpose()
    }

    /// Find a user
    async fn find_customer(&mut self, user_id: i64) -> DomainResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, email, email_verified_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Customer {
            id: r.id,
            email: r.email,
            email_verified_at: r.email_verified_at,
        }))
    }

    /// Consistent (non-locking) stock read
    async fn find_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, pharmacy_id, medicine_id, quantity
            FROM stock_batches
            WHERE pharmacy_id = ? AND medicine_id = ?
            "#,
        )
        .bind(pharmacy_id)
        .bind(medicine_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(StockRow::into_stock))
    }

    /// Locking stock read
    async fn lock_stock(
        &mut self,
        pharmacy_id: i64,
        medicine_id: i64,
    ) -> DomainResult<Option<StockBatch>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, pharmacy_id, medicine_id, quantity
            FROM stock_batches
            WHERE pharmacy_id = ? AND medicine_id = ?
            FOR UPDATE
            "#,
        )
        .bind(pharmacy_id)
        .bind(medicine_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(StockRow::into_stock))
    }

    /// Guarded decrement
    async fn decrement_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE stock_batches
            SET quantity = quantity - ?
            WHERE id = ? AND quantity >= ?
            "#,
        )
        .bind(quantity)
        .bind(stock_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            error!(stock_id, quantity, "Stock decrement rejected");
            return Err(DomainError::ConstraintViolation(format!(
                "stock {} cannot be decremented by {}",
                stock_id, quantity
            )));
        }

        Ok(())
    }

    /// Increment
    async fn increment_stock(&mut self, stock_id: i64, quantity: u32) -> DomainResult<()> {
        let rows_affected =
            sqlx::query("UPDATE stock_batches SET quantity = quantity + ? WHERE id = ?")
                .bind(quantity)
                .bind(stock_id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

        if rows_affected == 0 {
            return Err(DomainError::not_found("Stock batch", stock_id));
        }

        Ok(())
    }

    /// Insert order and lines
    async fn insert_order(&mut self, order: NewOrder) -> DomainResult<Order> {
        let now = Utc::now();

        let order_id = sqlx::query(
            r#"
            INSERT INTO orders (
                user_id, pharmacy_id, status, payment_method,
                billing_address, shipping_address,
                subtotal_cents, tax_cents, shipping_cents,
                total_items, total_amount_cents, currency,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.user_id)
        .bind(order.pharmacy_id)
        .bind(order.status.to_string())
        .bind(order.payment_method.to_string())
        .bind(&order.billing_address)
        .bind(&order.shipping_address)
        .bind(order.totals.subtotal.to_cents())
        .bind(order.totals.tax.to_cents())
        .bind(order.totals.shipping.to_cents())
        .bind(order.totals.total_items)
        .bind(order.totals.total_amount.to_cents())
        .bind(&order.currency)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await?
        .last_insert_id() as i64;

        let mut line_ids = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let line_id = sqlx::query(
                r#"
                INSERT INTO order_medicines (order_id, medicine_id, quantity, price_at_time_cents)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(line.medicine_id)
            .bind(line.quantity)
            .bind(line.price_at_time.to_cents())
            .execute(&mut *self.tx)
            .await?
            .last_insert_id() as i64;
            line_ids.push(line_id);
        }

        debug!(order_id, lines = line_ids.len(), "Order inserted");
        Ok(order.into_order(order_id, &line_ids, now))
    }

    /// Insert prescription upload record
    async fn insert_prescription_upload(
        &mut self,
        order_id: i64,
        file_path: &str,
    ) -> DomainResult<PrescriptionUpload> {
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO prescription_uploads
                (order_id, file_path, ocr_text, validated_by_doctor, created_at)
            VALUES (?, ?, NULL, FALSE, ?)
            "#,
        )
        .bind(order_id)
        .bind(file_path)
        .bind(now)
        .execute(&mut *self.tx)
        .await?
        .last_insert_id() as i64;

        Ok(PrescriptionUpload {
            id,
            order_id,
            file_path: file_path.to_string(),
            ocr_text: None,
            validated_by_doctor: false,
            created_at: now,
        })
    }

    /// Delete cart lines, then the cart
    async fn delete_cart(&mut self, cart_id: i64) -> DomainResult<()> {
        sqlx::query("DELETE FROM order_medicines WHERE order_id = ?")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?;

        let rows_affected = sqlx::query("DELETE FROM orders WHERE id = ? AND status = 'cart'")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DomainError::not_found("Cart", cart_id));
        }

        debug!(cart_id, "Cart deleted");
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DomainResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Database row structs
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i64,
    user_id: i64,
    pharmacy_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self, lines: Vec<CartLineRow>) -> DomainResult<Cart> {
        Ok(Cart {
            id: self.id,
            user_id: self.user_id,
            pharmacy_id: self.pharmacy_id,
            status: self.status.parse::<OrderStatus>()?,
            lines: lines.into_iter().map(CartLineRow::into_line).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i64,
    medicine_id: i64,
    quantity: u32,
    price_at_time_cents: i64,
    brand_name: Option<String>,
    price_cents: Option<i64>,
}

impl CartLineRow {
    fn into_line(self) -> CartLine {
        CartLine {
            id: self.id,
            medicine_id: self.medicine_id,
            medicine_name: self.brand_name,
            quantity: self.quantity,
            price_at_time: Money::from_cents(self.price_at_time_cents),
            current_price: self.price_cents.map(Money::from_cents),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PharmacyRow {
    id: i64,
    name: Option<String>,
    location: Option<String>,
    contact_info: Option<String>,
    verified: bool,
    status: String,
}

impl PharmacyRow {
    fn into_pharmacy(self) -> DomainResult<Pharmacy> {
        Ok(Pharmacy {
            id: self.id,
            name: self.name,
            location: self.location,
            contact_info: self.contact_info,
            verified: self.verified,
            status: self.status.parse()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    email: String,
    email_verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: i64,
    pharmacy_id: i64,
    medicine_id: i64,
    quantity: u32,
}

impl StockRow {
    fn into_stock(self) -> StockBatch {
        StockBatch {
            id: self.id,
            pharmacy_id: self.pharmacy_id,
            medicine_id: self.medicine_id,
            quantity: self.quantity,
        }
    }
}
