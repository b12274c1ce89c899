use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Order, PaymentState};
use crate::infrastructure::config::PaymentGatewayConfig;
use crate::ports::{PaymentGatewayPort, PaymentRequest, PaymentResult};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

/// Payment gateway adapter.
///
/// Cash orders are settled offline. Other methods are posted to the
/// configured gateway; any transport or gateway failure is reported as an
/// unsuccessful `PaymentResult`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: Arc<PaymentGatewayConfig>,
    client: Client,
}

impl HttpPaymentGateway {
    pub fn new(config: Arc<PaymentGatewayConfig>) -> DomainResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }

    /// Hex HMAC-SHA256 of the request body
    fn sign(&self, body: &str) -> DomainResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| DomainError::Configuration(format!("Invalid gateway secret: {}", e)))?;
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Stable per order, so a replayed request is not charged twice
    fn idempotency_key(order: &Order) -> String {
        format!("order-{}", order.id)
    }

    async fn post_payment(
        &self,
        base_url: &str,
        order: &Order,
        request: &PaymentRequest,
    ) -> DomainResult<PaymentResult> {
        let url = format!("{}/payments", base_url);
        let reference = Self::idempotency_key(order);

        let body = json!({
            "reference": reference,
            "order_id": order.id,
            "user_id": order.user_id,
            "method": request.method,
            "currency": request.currency,
            "amount_cents": order.totals.total_amount.to_cents(),
        });
        let body_str = body.to_string();
        debug!(order_id = order.id, "Payment request body: {}", body_str);

        let signature = self.sign(&body_str)?;

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Signature", signature)
            .header("Idempotency-Key", &reference)
            .body(body_str)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(order_id = order.id, "Payment gateway error: {} - {}", status, error_text);
            return Err(DomainError::PaymentGateway(format!(
                "Gateway returned {}: {}",
                status, error_text
            )));
        }

        let resp_json: serde_json::Value = response.json().await?;
        debug!(order_id = order.id, "Payment gateway response: {}", resp_json);

        let state = match resp_json["status"].as_str() {
            Some("succeeded") => PaymentState::Succeeded,
            Some("failed") => PaymentState::Failed,
            _ => PaymentState::Pending,
        };
        let message = resp_json["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| format!("Payment {}", state));
        let reference = resp_json["reference"]
            .as_str()
            .map(String::from)
            .unwrap_or(reference);

        Ok(PaymentResult {
            success: state != PaymentState::Failed,
            message,
            state,
            reference: Some(reference),
        })
    }
}

#[async_trait]
impl PaymentGatewayPort for HttpPaymentGateway {
    async fn process_payment(
        &self,
        order: &Order,
        request: &PaymentRequest,
    ) -> DomainResult<PaymentResult> {
        if request.method.is_offline() {
            info!(order_id = order.id, "Cash payment, collected on delivery");
            return Ok(PaymentResult {
                success: true,
                message: "Payment will be collected on delivery".to_string(),
                state: PaymentState::Pending,
                reference: None,
            });
        }

        let Some(base_url) = self.config.base_url.as_deref() else {
            return Ok(PaymentResult::failed(
                format!("Payment method {} is not available", request.method),
                None,
            ));
        };

        match self.post_payment(base_url, order, request).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(PaymentResult::failed(
                format!("Payment processing error: {}", e),
                Some(Self::idempotency_key(order)),
            )),
        }
    }
}
