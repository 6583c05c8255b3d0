use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Charge, ChargeRequest, PaymentMethod, PaymentProcessor, ProcessorError};

/// Processor double with a fixed set of payment methods and a log of charges.
#[derive(Default)]
pub struct MockPaymentProcessor {
    methods: Mutex<HashMap<String, PaymentMethod>>,
    charges: Mutex<Vec<ChargeRequest>>,
    fail_charges: AtomicBool,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(self, id: &str, method_type: &str, customer: Option<&str>) -> Self {
        self.add_method(id, method_type, customer);
        self
    }

    pub fn add_method(&self, id: &str, method_type: &str, customer: Option<&str>) {
        if let Ok(mut methods) = self.methods.lock() {
            methods.insert(
                id.to_string(),
                PaymentMethod {
                    id: id.to_string(),
                    method_type: method_type.to_string(),
                    customer: customer.map(str::to_string),
                },
            );
        }
    }

    /// Make every following charge fail with a card decline.
    pub fn fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges
            .lock()
            .map(|charges| charges.clone())
            .unwrap_or_default()
    }

    pub fn charge_count(&self) -> usize {
        self.charges().len()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, ProcessorError> {
        self.methods
            .lock()
            .map_err(|_| ProcessorError::Request("mock processor poisoned".to_string()))?
            .get(payment_method_id)
            .cloned()
            .ok_or_else(|| ProcessorError::NotFound(payment_method_id.to_string()))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ProcessorError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            tracing::info!(amount = request.amount, "[MOCK] Charge declined");
            return Err(ProcessorError::Api {
                code: "card_declined".to_string(),
                message: "Your card was declined.".to_string(),
            });
        }

        let mut charges = self
            .charges
            .lock()
            .map_err(|_| ProcessorError::Request("mock processor poisoned".to_string()))?;
        charges.push(request.clone());

        tracing::info!(
            amount = request.amount,
            customer = %request.customer,
            "[MOCK] Charge would be created"
        );

        Ok(Charge {
            id: format!("pi_mock_{}", charges.len()),
            status: "processing".to_string(),
        })
    }
}
