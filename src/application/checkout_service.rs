use crate::application::cart_validator::CartValidator;
use crate::application::dto::{
    CheckoutRequest, CheckoutResult, CheckoutStage, CheckoutSummary, ReadyCart, ValidationResult,
};
use crate::application::order_materializer::OrderMaterializer;
use crate::application::reservation::{
    ReservationCoordinator, ReservationOutcome, ReservationRecord,
};
use crate::application::retry::retry_transient;
use crate::application::totals::calculate_order_totals;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Cart, CheckoutPolicy, LockMode, OrderTotals};
use crate::ports::{
    CartExpiryPolicy, CheckoutStorePort, CheckoutTransaction, PaymentGatewayPort, PaymentRequest,
    PaymentResult, PrescriptionStoragePort,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one attempt has done so far, for compensation
#[derive(Debug)]
struct AttemptProgress {
    cart_id: i64,
    stage: CheckoutStage,
    reservation: Option<ReservationRecord>,
    order_id: Option<i64>,
    stored_files: Vec<String>,
}

impl AttemptProgress {
    fn new(cart_id: i64) -> Self {
        Self {
            cart_id,
            stage: CheckoutStage::Validating,
            reservation: None,
            order_id: None,
            stored_files: Vec::new(),
        }
    }

    fn enter(&mut self, stage: CheckoutStage) {
        self.stage = stage;
        debug!(cart_id = self.cart_id, stage = %stage, "Checkout stage");
    }
}

/// Checkout service: turns a cart into an order
pub struct CheckoutService<S, P, F>
where
    S: CheckoutStorePort,
    P: PaymentGatewayPort,
    F: PrescriptionStoragePort,
{
    store: Arc<S>,
    payment_gateway: Arc<P>,
    policy: Arc<CheckoutPolicy>,
    validator: CartValidator,
    reservations: ReservationCoordinator,
    materializer: OrderMaterializer<F>,
}

impl<S, P, F> CheckoutService<S, P, F>
where
    S: CheckoutStorePort,
    P: PaymentGatewayPort,
    F: PrescriptionStoragePort,
{
    pub fn new(
        store: Arc<S>,
        payment_gateway: Arc<P>,
        prescription_storage: Arc<F>,
        expiry: Arc<dyn CartExpiryPolicy>,
        policy: CheckoutPolicy,
    ) -> Self {
        let policy = Arc::new(policy);
        Self {
            store,
            payment_gateway,
            validator: CartValidator::new(policy.clone(), expiry),
            reservations: ReservationCoordinator::new(),
            materializer: OrderMaterializer::new(prescription_storage),
            policy,
        }
    }

    pub fn policy(&self) -> &CheckoutPolicy {
        &self.policy
    }

    /// Check a cart without touching stock.
    ///
    /// Takes a shared lock on the cart for the duration of the check and
    /// always rolls back.
    pub async fn validate_cart_for_checkout(&self, cart_id: i64, user_id: i64) -> ValidationResult {
        info!(cart_id, user_id, "Validating cart for checkout");

        let result = retry_transient(self.policy.max_attempts, move |_| {
            self.preview(cart_id, user_id)
        })
        .await;

        match result {
            Ok(validation) => validation,
            Err(e) => {
                error!(cart_id, user_id, "Checkout validation error: {}", e);
                ValidationResult::system_error()
            }
        }
    }

    /// Price a cart's lines with the configured tax and shipping
    pub fn calculate_order_totals(&self, cart: &Cart) -> OrderTotals {
        calculate_order_totals(&cart.lines, &self.policy)
    }

    /// Validated view of a cart for the confirmation screen.
    ///
    /// Returns the failed `ValidationResult` unchanged when the cart cannot
    /// be checked out.
    pub async fn get_checkout_summary(
        &self,
        cart_id: i64,
        user_id: i64,
    ) -> Result<CheckoutSummary, ValidationResult> {
        let validation = self.validate_cart_for_checkout(cart_id, user_id).await;

        if let Some(ready) = validation.ready_cart() {
            return Ok(CheckoutSummary::from_ready_cart(
                ready,
                &self.policy.estimated_delivery,
            ));
        }

        Err(validation)
    }

    /// Check out a cart.
    ///
    /// Each attempt runs in its own transaction; attempts that lose a lock
    /// conflict are retried up to the policy's attempt limit.
    pub async fn process_checkout(
        &self,
        cart_id: i64,
        user_id: i64,
        request: CheckoutRequest,
    ) -> CheckoutResult {
        info!(cart_id, user_id, "Processing checkout");
        let request = &request;

        let result = retry_transient(self.policy.max_attempts, move |attempt| {
            self.attempt_checkout(cart_id, user_id, request, attempt)
        })
        .await;

        match result {
            Ok(result) => result,
            Err(e) => {
                error!(cart_id, user_id, "Checkout processing error: {}", e);
                CheckoutResult::system_error(None)
            }
        }
    }

    async fn preview(&self, cart_id: i64, user_id: i64) -> DomainResult<ValidationResult> {
        let mut tx = self.store.begin().await?;

        let validation = self
            .validator
            .validate(tx.as_mut(), cart_id, user_id, LockMode::Shared, Utc::now())
            .await;

        // Read-only
        if let Err(e) = tx.rollback().await {
            warn!(cart_id, "Failed to roll back validation transaction: {}", e);
        }

        validation
    }

    /// One transactional attempt.
    ///
    /// Transient faults come back as `Err` so the caller can retry; every
    /// other outcome, including unexpected faults, is settled here.
    async fn attempt_checkout(
        &self,
        cart_id: i64,
        user_id: i64,
        request: &CheckoutRequest,
        attempt: u32,
    ) -> DomainResult<CheckoutResult> {
        debug!(cart_id, attempt, "Starting checkout attempt");
        let mut tx = self.store.begin().await?;
        let mut progress = AttemptProgress::new(cart_id);

        let outcome = self
            .run_stages(tx.as_mut(), cart_id, user_id, request, &mut progress)
            .await;

        match outcome {
            Ok(result) if result.success => {
                if let Err(e) = tx.commit().await {
                    error!(
                        cart_id,
                        order_id = ?progress.order_id,
                        "Failed to commit checkout: {}",
                        e
                    );
                    self.materializer.discard_files(&progress.stored_files).await;
                    return settle_fault(e, progress.stage);
                }

                info!(
                    cart_id,
                    order_id = ?result.order_id,
                    attempt,
                    "Checkout completed"
                );
                Ok(result)
            }
            Ok(result) => {
                self.rollback(tx, cart_id).await;
                Ok(result)
            }
            Err(e) => {
                error!(
                    cart_id,
                    order_id = ?progress.order_id,
                    stage = %progress.stage,
                    attempt,
                    "Checkout processing error: {}",
                    e
                );

                if let Some(reservation) = progress.reservation.take() {
                    reservation.release(tx.as_mut()).await;
                }
                self.materializer.discard_files(&progress.stored_files).await;
                self.rollback(tx, cart_id).await;

                settle_fault(e, progress.stage)
            }
        }
    }

    async fn run_stages(
        &self,
        tx: &mut dyn CheckoutTransaction,
        cart_id: i64,
        user_id: i64,
        request: &CheckoutRequest,
        progress: &mut AttemptProgress,
    ) -> DomainResult<CheckoutResult> {
        // Validating: exclusive cart lock held until the transaction ends
        progress.enter(CheckoutStage::Validating);
        let validation = self
            .validator
            .validate(tx, cart_id, user_id, LockMode::Exclusive, Utc::now())
            .await?;
        if !validation.valid {
            debug!(cart_id, errors = ?validation.errors, "Cart rejected");
            return Ok(CheckoutResult::rejected(validation));
        }
        let Some(ReadyCart { cart, totals, .. }) = validation.into_ready_cart() else {
            return Err(DomainError::Internal(
                "validated cart without snapshot".to_string(),
            ));
        };

        // Reserving
        progress.enter(CheckoutStage::Reserving);
        match self.reservations.reserve(tx, &cart).await? {
            ReservationOutcome::Reserved(record) => progress.reservation = Some(record),
            ReservationOutcome::Rejected { message } => {
                return Ok(CheckoutResult::reservation_failed(&message));
            }
        }

        // Materializing
        progress.enter(CheckoutStage::Materializing);
        let materialized = match self
            .materializer
            .materialize(tx, &cart, &totals, request, &self.policy.default_currency)
            .await
        {
            Ok(materialized) => materialized,
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                error!(cart_id, "Order creation error: {}", e);
                if let Some(reservation) = progress.reservation.take() {
                    reservation.release(tx).await;
                }
                return Ok(CheckoutResult::order_creation_failed());
            }
        };
        let order = materialized.order.clone();
        progress.order_id = Some(order.id);
        progress.stored_files = materialized.stored_files();

        // StockUpdating: stock was already decremented while reserving
        progress.enter(CheckoutStage::StockUpdating);

        // PaymentInitiating: never fatal
        progress.enter(CheckoutStage::PaymentInitiating);
        let payment_request = PaymentRequest {
            method: order.payment_method,
            currency: order.currency.clone(),
        };
        let payment_result = match self
            .payment_gateway
            .process_payment(&order, &payment_request)
            .await
        {
            Ok(result) => result,
            Err(e) => PaymentResult::failed(format!("Payment processing error: {}", e), None),
        };
        if !payment_result.success {
            warn!(
                order_id = order.id,
                "Payment failed for order {}: {}",
                order.id,
                payment_result.message
            );
        }

        // Finalizing: the cart is consumed
        progress.enter(CheckoutStage::Finalizing);
        tx.delete_cart(cart.id).await?;

        progress.enter(CheckoutStage::Done);
        Ok(CheckoutResult::completed(order, payment_result))
    }

    async fn rollback(&self, tx: Box<dyn CheckoutTransaction>, cart_id: i64) {
        if let Err(e) = tx.rollback().await {
            error!(cart_id, "Failed to roll back checkout transaction: {}", e);
        }
    }
}

/// Transient faults go back to the retry loop; anything else ends the
/// checkout with a generic system error.
fn settle_fault(error: DomainError, stage: CheckoutStage) -> DomainResult<CheckoutResult> {
    if error.is_retryable() {
        Err(error)
    } else {
        Ok(CheckoutResult::system_error(Some(stage)))
    }
}
