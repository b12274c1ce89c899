use crate::domain::errors::DomainResult;
use crate::domain::{Order, PaymentMethod, PaymentState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payment instruction for a freshly created order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub currency: String,
}

/// Outcome reported by the payment collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub message: String,
    pub state: PaymentState,

    /// Gateway transaction or idempotency reference
    pub reference: Option<String>,
}

impl PaymentResult {
    pub fn failed(message: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            state: PaymentState::Failed,
            reference,
        }
    }
}

/// Payment collaborator port
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Initiate payment for an order.
    ///
    /// A declined payment is `Ok` with `success == false`; `Err` is kept for
    /// faults the adapter cannot classify.
    async fn process_payment(
        &self,
        order: &Order,
        request: &PaymentRequest,
    ) -> DomainResult<PaymentResult>;
}
