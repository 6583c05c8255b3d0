//! Stripe client for payment method lookup and payment intent creation.
//!
//! Requests are form-encoded with bearer auth. Charges carry the invoice id as
//! idempotency key.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

use super::{Charge, ChargeRequest, PaymentMethod, PaymentProcessor, ProcessorError};
use crate::config::StripeConfig;
use crate::services::metrics::PROCESSOR_REQUESTS_TOTAL;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    code: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, ProcessorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProcessorError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn ensure_configured(&self) -> Result<(), ProcessorError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ProcessorError::NotConfigured(
                "Stripe secret key not set".to_string(),
            ))
        }
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> ProcessorError {
        match serde_json::from_str::<StripeErrorBody>(body) {
            Ok(parsed) => ProcessorError::Api {
                code: parsed
                    .error
                    .code
                    .or(parsed.error.error_type)
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: parsed.error.message.unwrap_or_default(),
            },
            Err(_) => ProcessorError::Api {
                code: status.as_u16().to_string(),
                message: body.to_string(),
            },
        }
    }

    fn record(operation: &str, outcome: &str) {
        PROCESSOR_REQUESTS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

fn charge_form(request: &ChargeRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("customer".to_string(), request.customer.clone()),
        ("payment_method".to_string(), request.payment_method.clone()),
        ("confirmation_method".to_string(), "automatic".to_string()),
        ("confirm".to_string(), "true".to_string()),
        ("transfer_group".to_string(), request.transfer_group.clone()),
        (
            "statement_descriptor".to_string(),
            request.statement_descriptor.clone(),
        ),
        ("description".to_string(), request.description.clone()),
    ];

    for (i, method_type) in request.payment_method_types.iter().enumerate() {
        form.push((
            format!("payment_method_types[{}]", i),
            method_type.as_str().to_string(),
        ));
    }

    form
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, ProcessorError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(self.url(&format!("payment_methods/{}", payment_method_id)))
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                Self::record("retrieve_payment_method", "error");
                ProcessorError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProcessorError::Request(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            Self::record("retrieve_payment_method", "not_found");
            return Err(ProcessorError::NotFound(payment_method_id.to_string()));
        }

        if !status.is_success() {
            Self::record("retrieve_payment_method", "error");
            return Err(Self::api_error(status, &body));
        }

        Self::record("retrieve_payment_method", "success");
        serde_json::from_str(&body).map_err(|e| ProcessorError::Decode(e.to_string()))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, ProcessorError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.url("payment_intents"))
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&charge_form(request))
            .send()
            .await
            .map_err(|e| {
                Self::record("create_payment_intent", "error");
                ProcessorError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProcessorError::Request(e.to_string()))?;

        if !status.is_success() {
            Self::record("create_payment_intent", "error");
            let err = Self::api_error(status, &body);
            tracing::error!(status = %status, error = %err, "Stripe payment intent failed");
            return Err(err);
        }

        let charge: Charge =
            serde_json::from_str(&body).map_err(|e| ProcessorError::Decode(e.to_string()))?;

        Self::record("create_payment_intent", "success");
        tracing::info!(
            payment_intent_id = %charge.id,
            status = %charge.status,
            amount = request.amount,
            "Stripe payment intent created"
        );

        Ok(charge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethodType;

    #[test]
    fn charge_form_lists_every_allowed_method_type() {
        let request = ChargeRequest {
            amount: 10_500,
            currency: "usd".to_string(),
            customer: "cus_1".to_string(),
            payment_method: "pm_1".to_string(),
            payment_method_types: PaymentMethodType::ALL.to_vec(),
            transfer_group: "inv_1".to_string(),
            statement_descriptor: "Partner Payouts".to_string(),
            description: "Partner payout invoice (inv_1)".to_string(),
            idempotency_key: "inv_1".to_string(),
        };

        let form = charge_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("amount"), Some("10500"));
        assert_eq!(get("confirm"), Some("true"));
        assert_eq!(get("transfer_group"), Some("inv_1"));
        assert_eq!(get("payment_method_types[0]"), Some("us_bank_account"));
        assert_eq!(get("payment_method_types[1]"), Some("card"));
        assert_eq!(get("payment_method_types[2]"), Some("link"));
    }
}
