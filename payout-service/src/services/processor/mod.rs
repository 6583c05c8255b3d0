//! Payment processor seam used to charge workspaces for payout invoices.

mod mock;
mod stripe;

pub use mock::MockPaymentProcessor;
pub use stripe::StripeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PaymentMethodType;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor not configured: {0}")]
    NotConfigured(String),

    #[error("Processor request failed: {0}")]
    Request(String),

    #[error("Processor error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Payment method not found: {0}")]
    NotFound(String),

    #[error("Unexpected processor response: {0}")]
    Decode(String),
}

/// Stored payment method as reported by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub customer: Option<String>,
}

/// A confirmed charge of a workspace for one invoice.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Total in cents, fee included.
    pub amount: i64,
    pub currency: String,
    pub customer: String,
    pub payment_method: String,
    pub payment_method_types: Vec<PaymentMethodType>,
    pub transfer_group: String,
    pub statement_descriptor: String,
    pub description: String,
    /// Retries with the same key never charge twice.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, ProcessorError>;

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ProcessorError>;
}
