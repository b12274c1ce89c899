#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pharmacy_checkout::application::CheckoutService;
use pharmacy_checkout::domain::errors::{DomainError, DomainResult};
use pharmacy_checkout::domain::{
    CheckoutPolicy, Customer, Money, Order, PaymentState, Pharmacy, PharmacyStatus,
};
use pharmacy_checkout::infrastructure::{InMemoryCheckoutStore, SeedCart, TtlCartExpiry};
use pharmacy_checkout::ports::{
    PaymentGatewayPort, PaymentRequest, PaymentResult, PrescriptionFile, PrescriptionStoragePort,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PHARMACY_ID: i64 = 1;
pub const USER_ID: i64 = 7;
pub const OTHER_USER_ID: i64 = 8;

pub const PANADOL: i64 = 10;
pub const AUGMENTIN: i64 = 11;
pub const BRUFEN: i64 = 12;

pub const INITIAL_STOCK: u32 = 20;

pub type TestService =
    CheckoutService<InMemoryCheckoutStore, ScriptedPaymentGateway, MemoryPrescriptionStorage>;

/// What the payment double does on its next call
#[derive(Debug, Clone)]
pub enum PaymentScript {
    Approve,
    Decline(String),
    Fault(String),
}

/// Payment gateway double; approves unless scripted otherwise
#[derive(Default)]
pub struct ScriptedPaymentGateway {
    script: Mutex<VecDeque<PaymentScript>>,
    calls: Mutex<Vec<(i64, PaymentRequest)>>,
}

impl ScriptedPaymentGateway {
    pub fn push(&self, step: PaymentScript) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Order ids and requests seen so far
    pub fn calls(&self) -> Vec<(i64, PaymentRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGatewayPort for ScriptedPaymentGateway {
    async fn process_payment(
        &self,
        order: &Order,
        request: &PaymentRequest,
    ) -> DomainResult<PaymentResult> {
        self.calls.lock().unwrap().push((order.id, request.clone()));
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PaymentScript::Approve);

        match step {
            PaymentScript::Approve => Ok(PaymentResult {
                success: true,
                message: "Payment approved".to_string(),
                state: PaymentState::Succeeded,
                reference: Some(format!("order-{}", order.id)),
            }),
            PaymentScript::Decline(message) => Ok(PaymentResult::failed(message, None)),
            PaymentScript::Fault(message) => Err(DomainError::PaymentGateway(message)),
        }
    }
}

/// Prescription storage double keeping files in memory
#[derive(Default)]
pub struct MemoryPrescriptionStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    discarded: Mutex<Vec<String>>,
    fail_after: Mutex<Option<usize>>,
    stored_count: Mutex<usize>,
}

impl MemoryPrescriptionStorage {
    /// Fail every store once `count` files have been stored
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock().unwrap() = Some(count);
    }

    pub fn files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrescriptionStoragePort for MemoryPrescriptionStorage {
    async fn store(&self, order_id: i64, file: &PrescriptionFile) -> DomainResult<String> {
        let mut stored_count = self.stored_count.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if *stored_count >= limit {
                return Err(DomainError::Storage(io::Error::new(
                    io::ErrorKind::Other,
                    "disk full",
                )));
            }
        }
        *stored_count += 1;

        let path = format!("mem://{}/{}-{}", order_id, *stored_count, file.file_name);
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), file.contents.clone());
        Ok(path)
    }

    async fn discard(&self, file_path: &str) -> DomainResult<()> {
        self.files.lock().unwrap().remove(file_path);
        self.discarded.lock().unwrap().push(file_path.to_string());
        Ok(())
    }
}

pub fn verified_pharmacy() -> Pharmacy {
    Pharmacy {
        id: PHARMACY_ID,
        name: Some("Nile Pharmacy".to_string()),
        location: Some("12 Corniche St, Cairo".to_string()),
        contact_info: Some("+20 2 1234 5678".to_string()),
        verified: true,
        status: PharmacyStatus::Active,
    }
}

pub fn verified_customer(id: i64) -> Customer {
    Customer {
        id,
        email: format!("user{}@example.com", id),
        email_verified_at: Some(Utc::now()),
    }
}

/// Seeded store, doubles and service
pub struct Fixture {
    pub store: InMemoryCheckoutStore,
    pub payments: Arc<ScriptedPaymentGateway>,
    pub prescriptions: Arc<MemoryPrescriptionStorage>,
    pub service: Arc<TestService>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_policy(CheckoutPolicy::default())
    }

    pub fn with_policy(policy: CheckoutPolicy) -> Self {
        let store = InMemoryCheckoutStore::new(Duration::from_secs(2));
        store.add_pharmacy(verified_pharmacy());
        store.add_customer(verified_customer(USER_ID));
        store.add_customer(verified_customer(OTHER_USER_ID));
        store.add_medicine(PANADOL, "Panadol", Some(Money::from_major(100)));
        store.add_medicine(AUGMENTIN, "Augmentin", Some(Money::from_major(50)));
        store.add_medicine(BRUFEN, "Brufen", Some(Money::from_cents(2_250)));
        store.add_stock(PHARMACY_ID, PANADOL, INITIAL_STOCK);
        store.add_stock(PHARMACY_ID, AUGMENTIN, INITIAL_STOCK);
        store.add_stock(PHARMACY_ID, BRUFEN, INITIAL_STOCK);

        let payments = Arc::new(ScriptedPaymentGateway::default());
        let prescriptions = Arc::new(MemoryPrescriptionStorage::default());
        let service = Arc::new(CheckoutService::new(
            Arc::new(store.clone()),
            payments.clone(),
            prescriptions.clone(),
            Arc::new(TtlCartExpiry::default()),
            policy,
        ));

        Self {
            store,
            payments,
            prescriptions,
            service,
        }
    }

    /// Cart for `USER_ID` with prices captured at the current listing
    pub fn cart(&self, lines: &[(i64, u32)]) -> i64 {
        self.cart_for(USER_ID, lines, Utc::now())
    }

    pub fn cart_for(&self, user_id: i64, lines: &[(i64, u32)], updated_at: DateTime<Utc>) -> i64 {
        let prices: HashMap<i64, Money> = [
            (PANADOL, Money::from_major(100)),
            (AUGMENTIN, Money::from_major(50)),
            (BRUFEN, Money::from_cents(2_250)),
        ]
        .into_iter()
        .collect();

        let seed = lines.iter().fold(
            SeedCart::new(user_id, PHARMACY_ID).updated_at(updated_at),
            |seed, (medicine_id, quantity)| {
                let price = prices
                    .get(medicine_id)
                    .copied()
                    .unwrap_or(Money::from_major(1));
                seed.line(*medicine_id, *quantity, price)
            },
        );
        self.store.add_cart(seed)
    }

    pub fn stock(&self, medicine_id: i64) -> u32 {
        self.store
            .stock_quantity(PHARMACY_ID, medicine_id)
            .unwrap_or_default()
    }
}

pub fn prescription(name: &str, contents: &[u8]) -> PrescriptionFile {
    PrescriptionFile {
        file_name: name.to_string(),
        content_type: Some("image/jpeg".to_string()),
        contents: contents.to_vec(),
    }
}
