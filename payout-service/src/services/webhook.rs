//! PayPal payout-item webhook processing.

use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::utils::signature::verify_webhook_signature;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{Payout, PayoutStatus, PayoutUpdate, ProgramSummary};
use crate::services::metrics::record_webhook_event;
use crate::services::notifications::{NotificationJob, NotificationQueue, PayoutEmail};
use crate::services::store::Store;

/// Payout item events that move a payout out of `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutItemEvent {
    Succeeded,
    Blocked,
    Canceled,
    Denied,
    Failed,
    Held,
    Refunded,
    Returned,
}

impl PayoutItemEvent {
    pub const ALL: [PayoutItemEvent; 8] = [
        PayoutItemEvent::Succeeded,
        PayoutItemEvent::Blocked,
        PayoutItemEvent::Canceled,
        PayoutItemEvent::Denied,
        PayoutItemEvent::Failed,
        PayoutItemEvent::Held,
        PayoutItemEvent::Refunded,
        PayoutItemEvent::Returned,
    ];

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == event_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutItemEvent::Succeeded => "PAYMENT.PAYOUTS-ITEM.SUCCEEDED",
            PayoutItemEvent::Blocked => "PAYMENT.PAYOUTS-ITEM.BLOCKED",
            PayoutItemEvent::Canceled => "PAYMENT.PAYOUTS-ITEM.CANCELED",
            PayoutItemEvent::Denied => "PAYMENT.PAYOUTS-ITEM.DENIED",
            PayoutItemEvent::Failed => "PAYMENT.PAYOUTS-ITEM.FAILED",
            PayoutItemEvent::Held => "PAYMENT.PAYOUTS-ITEM.HELD",
            PayoutItemEvent::Refunded => "PAYMENT.PAYOUTS-ITEM.REFUNDED",
            PayoutItemEvent::Returned => "PAYMENT.PAYOUTS-ITEM.RETURNED",
        }
    }

    pub fn target_status(&self) -> PayoutStatus {
        match self {
            PayoutItemEvent::Succeeded => PayoutStatus::Completed,
            PayoutItemEvent::Canceled => PayoutStatus::Canceled,
            PayoutItemEvent::Held => PayoutStatus::Processing,
            PayoutItemEvent::Blocked
            | PayoutItemEvent::Denied
            | PayoutItemEvent::Failed
            | PayoutItemEvent::Refunded
            | PayoutItemEvent::Returned => PayoutStatus::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event_type: String,
    #[serde(default)]
    resource: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PayoutItemResource {
    /// Our invoice id.
    pub sender_batch_id: String,
    pub payout_item_id: String,
    pub payout_item_fee: PayoutItemFee,
    pub payout_item: PayoutItem,
}

#[derive(Debug, Deserialize)]
pub struct PayoutItemFee {
    pub currency: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PayoutItem {
    pub receiver: String,
    /// Our payout id.
    pub sender_item_id: String,
}

/// Signature headers of a webhook delivery.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub id: String,
    pub time: String,
    pub signature: String,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Webhook handler failed: {0}")]
    Processing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Ignored,
}

#[derive(Clone)]
pub struct PaypalWebhookService {
    store: Arc<dyn Store>,
    notifications: NotificationQueue,
    webhook_id: String,
    webhook_secret: Secret<String>,
}

impl PaypalWebhookService {
    pub fn new(
        store: Arc<dyn Store>,
        notifications: NotificationQueue,
        webhook_id: String,
        webhook_secret: Secret<String>,
    ) -> Self {
        Self {
            store,
            notifications,
            webhook_id,
            webhook_secret,
        }
    }

    /// Verify, decode and apply one delivery. `body` must be the raw request bytes.
    pub async fn handle(
        &self,
        transmission: Option<Transmission>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        if !self.verify(transmission.as_ref(), body) {
            warn!("Rejected webhook with invalid signature");
            record_webhook_event("unknown", "rejected");
            return Err(WebhookError::InvalidSignature);
        }

        let envelope: EventEnvelope = serde_json::from_slice(body).map_err(|e| {
            error!(error = %e, "Webhook body is not a valid event");
            record_webhook_event("unknown", "failed");
            WebhookError::Processing(format!("invalid event body: {}", e))
        })?;

        let Some(event) = PayoutItemEvent::from_event_type(&envelope.event_type) else {
            info!(event_type = %envelope.event_type, "Unsupported webhook event");
            record_webhook_event("unsupported", "ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        info!(event_type = event.as_str(), "PayPal webhook received");

        match self.apply(event, envelope.resource).await {
            Ok(outcome) => {
                record_webhook_event(event.as_str(), outcome);
                Ok(WebhookOutcome::Processed)
            }
            Err(e) => {
                error!(event_type = event.as_str(), error = %e, "PayPal webhook failed");
                record_webhook_event(event.as_str(), "failed");
                Err(e)
            }
        }
    }

    fn verify(&self, transmission: Option<&Transmission>, body: &[u8]) -> bool {
        let Some(t) = transmission else {
            return false;
        };
        let secret = self.webhook_secret.expose_secret();
        if secret.is_empty() {
            error!("Webhook secret not configured");
            return false;
        }

        verify_webhook_signature(
            secret,
            &t.id,
            &t.time,
            &self.webhook_id,
            body,
            &t.signature,
        )
        .unwrap_or(false)
    }

    /// Returns the metrics outcome label.
    async fn apply(
        &self,
        event: PayoutItemEvent,
        resource: serde_json::Value,
    ) -> Result<&'static str, WebhookError> {
        let resource: PayoutItemResource = serde_json::from_value(resource)
            .map_err(|e| WebhookError::Processing(format!("invalid resource: {}", e)))?;

        let invoice_id = &resource.sender_batch_id;
        let receiver = &resource.payout_item.receiver;

        let Ok(payout_id) = resource.payout_item.sender_item_id.parse::<Uuid>() else {
            info!(
                invoice_id = %invoice_id,
                receiver = %receiver,
                sender_item_id = %resource.payout_item.sender_item_id,
                "Payout not found for webhook"
            );
            return Ok("unknown_payout");
        };

        let Some(payout) = self.store.get_payout(payout_id).await.map_err(processing)? else {
            info!(
                invoice_id = %invoice_id,
                receiver = %receiver,
                payout_id = %payout_id,
                "Payout not found for webhook"
            );
            return Ok("unknown_payout");
        };

        if event == PayoutItemEvent::Succeeded && payout.status == PayoutStatus::Completed {
            info!(
                invoice_id = %invoice_id,
                receiver = %receiver,
                payout_id = %payout_id,
                "Payout already completed"
            );
            return Ok("duplicate");
        }

        if payout.status != PayoutStatus::Processing {
            warn!(
                payout_id = %payout_id,
                status = %payout.status,
                event_type = event.as_str(),
                "Out-of-order webhook for payout not in processing"
            );
            return Ok("out_of_order");
        }

        if event == PayoutItemEvent::Succeeded {
            self.complete(payout, resource.payout_item_id).await
        } else {
            self.record_failure(event, payout, &resource).await
        }
    }

    async fn complete(
        &self,
        payout: Payout,
        transfer_id: String,
    ) -> Result<&'static str, WebhookError> {
        let partner = self
            .store
            .get_partner(payout.partner_id)
            .await
            .map_err(processing)?;
        let program = self
            .store
            .get_program(payout.program_id)
            .await
            .map_err(processing)?;

        let mut tx = self.store.begin().await.map_err(processing)?;
        let updated = tx
            .transition_payout(
                payout.id,
                &[PayoutStatus::Processing],
                &PayoutUpdate {
                    status: PayoutStatus::Completed,
                    paypal_transfer_id: Some(transfer_id),
                    paid_at: Some(Utc::now()),
                    user_id: None,
                },
            )
            .await
            .map_err(processing)?;

        let Some(updated) = updated else {
            info!(payout_id = %payout.id, "Payout settled by a concurrent delivery");
            return Ok("duplicate");
        };

        let commissions = tx
            .mark_commissions_paid(payout.id)
            .await
            .map_err(processing)?;
        tx.commit().await.map_err(processing)?;

        info!(
            payout_id = %updated.id,
            commissions = commissions,
            "Payout completed"
        );

        if let (Some(email), Some(program)) = (partner.and_then(|p| p.email), program) {
            self.notifications.enqueue(NotificationJob::PayoutSent {
                program: ProgramSummary::from(&program),
                payout: PayoutEmail {
                    payout_id: updated.id,
                    email,
                    amount: updated.amount,
                    period_start: updated.period_start,
                    period_end: updated.period_end,
                },
            });
        }

        Ok("applied")
    }

    async fn record_failure(
        &self,
        event: PayoutItemEvent,
        payout: Payout,
        resource: &PayoutItemResource,
    ) -> Result<&'static str, WebhookError> {
        let status = event.target_status();

        let mut tx = self.store.begin().await.map_err(processing)?;
        let updated = tx
            .transition_payout(
                payout.id,
                &[PayoutStatus::Processing],
                &PayoutUpdate {
                    status,
                    paypal_transfer_id: Some(resource.payout_item_id.clone()),
                    paid_at: None,
                    user_id: None,
                },
            )
            .await
            .map_err(processing)?;

        if updated.is_none() {
            info!(payout_id = %payout.id, "Payout moved by a concurrent delivery");
            return Ok("out_of_order");
        }
        tx.commit().await.map_err(processing)?;

        info!(
            payout_id = %payout.id,
            status = %status,
            invoice_id = %resource.sender_batch_id,
            receiver = %resource.payout_item.receiver,
            "Payout status changed by processor"
        );

        self.notifications.enqueue(NotificationJob::AuditLog {
            payout_id: payout.id,
            event_type: event.as_str().to_string(),
            status,
            transfer_id: Some(resource.payout_item_id.clone()),
        });

        Ok("applied")
    }
}

fn processing(e: service_core::error::AppError) -> WebhookError {
    WebhookError::Processing(e.to_string())
}
