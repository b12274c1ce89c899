pub mod adapters;
pub mod config;

pub use adapters::{
    HttpPaymentGateway, InMemoryCheckoutStore, LocalPrescriptionStorage, MySqlCheckoutStore,
    SeedCart, TtlCartExpiry,
};
pub use config::{CheckoutConfig, PaymentGatewayConfig};
