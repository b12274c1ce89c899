pub mod cart_expiry_policy;
pub mod checkout_store_port;
pub mod payment_gateway_port;
pub mod prescription_storage_port;

pub use cart_expiry_policy::CartExpiryPolicy;
pub use checkout_store_port::{CheckoutStorePort, CheckoutTransaction};
pub use payment_gateway_port::{PaymentGatewayPort, PaymentRequest, PaymentResult};
pub use prescription_storage_port::{PrescriptionFile, PrescriptionStoragePort};
