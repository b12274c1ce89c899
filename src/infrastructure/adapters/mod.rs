pub mod http_payment_gateway;
pub mod in_memory_checkout_store;
pub mod local_prescription_storage;
pub mod mysql_checkout_store;
pub mod ttl_cart_expiry;

pub use http_payment_gateway::HttpPaymentGateway;
pub use in_memory_checkout_store::{InMemoryCheckoutStore, InMemoryCheckoutTransaction, SeedCart};
pub use local_prescription_storage::LocalPrescriptionStorage;
pub use mysql_checkout_store::{MySqlCheckoutStore, MySqlCheckoutTransaction};
pub use ttl_cart_expiry::TtlCartExpiry;
