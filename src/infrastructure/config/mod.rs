pub mod checkout_config;
pub mod payment_gateway_config;

pub use checkout_config::CheckoutConfig;
pub use payment_gateway_config::PaymentGatewayConfig;
