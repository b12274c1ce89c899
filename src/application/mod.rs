pub mod cart_validator;
pub mod checkout_service;
pub mod dto;
pub mod order_materializer;
pub mod reservation;
pub mod retry;
pub mod totals;

pub use cart_validator::CartValidator;
pub use checkout_service::CheckoutService;
pub use dto::{
    CheckoutRequest, CheckoutResult, CheckoutStage, CheckoutSummary, ValidationPayload,
    ValidationResult,
};
pub use reservation::{ReservationCoordinator, ReservationOutcome, ReservationRecord, ReservedItem};
pub use totals::calculate_order_totals;
