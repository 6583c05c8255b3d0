//! Post-commit side effects: partner emails and payout audit records.
//!
//! Request handlers enqueue jobs on a bounded channel and return; a single
//! worker task drains it. Delivery failures are logged and never reach the
//! request that caused them.

pub mod email;
pub mod templates;

pub use email::{EmailMessage, EmailProvider, MockEmailProvider, ProviderError, SmtpProvider};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{PayoutStatus, ProgramSummary};
use crate::services::metrics::record_notification;

/// One partner's share of a payout email.
#[derive(Debug, Clone)]
pub struct PayoutEmail {
    pub payout_id: Uuid,
    pub email: String,
    pub amount: i64,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum NotificationJob {
    /// Invoice charged by bank debit; partners are told the money is on its way.
    PayoutConfirmed {
        program: ProgramSummary,
        invoice_id: Uuid,
        payouts: Vec<PayoutEmail>,
    },
    /// Processor reported the transfer as delivered.
    PayoutSent {
        program: ProgramSummary,
        payout: PayoutEmail,
    },
    /// Non-success transition reported by the processor.
    AuditLog {
        payout_id: Uuid,
        event_type: String,
        status: PayoutStatus,
        transfer_id: Option<String>,
    },
}

impl NotificationJob {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationJob::PayoutConfirmed { .. } => "payout_confirmed",
            NotificationJob::PayoutSent { .. } => "payout_sent",
            NotificationJob::AuditLog { .. } => "audit_log",
        }
    }
}

/// Sending half of the job channel, cloned into application state.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { tx }, rx)
    }

    /// Returns false when the job was dropped.
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => {
                record_notification(kind, "queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(kind = kind, "Notification queue full, dropping job");
                record_notification(kind, "dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(kind = kind, "Notification worker stopped, dropping job");
                record_notification(kind, "dropped");
                false
            }
        }
    }
}

pub struct NotificationWorker {
    rx: mpsc::Receiver<NotificationJob>,
    email: Arc<dyn EmailProvider>,
    shutdown_token: CancellationToken,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<NotificationJob>,
        email: Arc<dyn EmailProvider>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            rx,
            email,
            shutdown_token,
        }
    }

    /// Spawn the worker loop on the runtime.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!("Notification worker started");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Notification worker shutting down");
                    break;
                }
                job = self.rx.recv() => {
                    match job {
                        Some(job) => self.handle(job).await,
                        None => {
                            tracing::info!("Notification channel closed, worker exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, job: NotificationJob) {
        let kind = job.kind();
        match job {
            NotificationJob::PayoutConfirmed {
                program,
                invoice_id,
                payouts,
            } => {
                let messages: Vec<EmailMessage> = payouts
                    .iter()
                    .map(|payout| templates::payout_confirmed(&program, payout))
                    .collect();

                let results = join_all(messages.iter().map(|m| self.email.send(m))).await;
                let failed = results.iter().filter(|r| r.is_err()).count();

                for (message, result) in messages.iter().zip(&results) {
                    if let Err(e) = result {
                        tracing::error!(
                            invoice_id = %invoice_id,
                            to = %message.to,
                            error = %e,
                            "Failed to send payout confirmation"
                        );
                    }
                }

                tracing::info!(
                    invoice_id = %invoice_id,
                    sent = results.len() - failed,
                    failed = failed,
                    "Payout confirmation emails processed"
                );
                record_notification(kind, if failed == 0 { "sent" } else { "failed" });
            }
            NotificationJob::PayoutSent { program, payout } => {
                let message = templates::payout_sent(&program, &payout);
                match self.email.send(&message).await {
                    Ok(_) => record_notification(kind, "sent"),
                    Err(e) => {
                        tracing::error!(
                            payout_id = %payout.payout_id,
                            error = %e,
                            "Failed to send payout email"
                        );
                        record_notification(kind, "failed");
                    }
                }
            }
            NotificationJob::AuditLog {
                payout_id,
                event_type,
                status,
                transfer_id,
            } => {
                tracing::info!(
                    target: "payout_audit",
                    payout_id = %payout_id,
                    event_type = %event_type,
                    status = %status,
                    transfer_id = ?transfer_id,
                    "Payout status changed by processor"
                );
                record_notification(kind, "sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn program() -> ProgramSummary {
        ProgramSummary {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            logo: None,
        }
    }

    fn payout_email(email: &str) -> PayoutEmail {
        PayoutEmail {
            payout_id: Uuid::new_v4(),
            email: email.to_string(),
            amount: 1_000,
            period_start: None,
            period_end: None,
        }
    }

    #[test]
    fn full_queue_drops_jobs() {
        let (queue, _rx) = NotificationQueue::new(1);
        let job = NotificationJob::AuditLog {
            payout_id: Uuid::new_v4(),
            event_type: "PAYMENT.PAYOUTS-ITEM.FAILED".to_string(),
            status: PayoutStatus::Failed,
            transfer_id: None,
        };

        assert!(queue.enqueue(job.clone()));
        assert!(!queue.enqueue(job));
    }

    #[tokio::test]
    async fn worker_sends_one_email_per_partner_and_survives_failures() {
        let (queue, rx) = NotificationQueue::new(8);
        let email = Arc::new(MockEmailProvider::new());
        let token = CancellationToken::new();
        let handle = NotificationWorker::new(rx, email.clone(), token.clone()).start();

        queue.enqueue(NotificationJob::PayoutConfirmed {
            program: program(),
            invoice_id: Uuid::new_v4(),
            payouts: vec![payout_email("a@example.com"), payout_email("b@example.com")],
        });

        for _ in 0..50 {
            if email.send_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(email.send_count(), 2);

        email.fail_sends(true);
        queue.enqueue(NotificationJob::PayoutSent {
            program: program(),
            payout: payout_email("c@example.com"),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(email.send_count(), 2);

        token.cancel();
        handle.await.unwrap();
    }
}
