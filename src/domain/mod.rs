pub mod entities;
pub mod errors;
pub mod policy;
pub mod value_objects;

pub use entities::{
    Cart, CartLine, Customer, Medicine, NewOrder, NewOrderLine, Order, OrderLine, OrderTotals,
    Pharmacy, PrescriptionUpload, StockBatch,
};
pub use errors::{DomainError, DomainResult, TransientFault};
pub use policy::CheckoutPolicy;
pub use value_objects::{
    ErrorCode, LockMode, Money, OrderStatus, PaymentMethod, PaymentState, PharmacyStatus,
};
