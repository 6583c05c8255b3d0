//! Invoice creation for pending payouts, and manual settlement.

use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::fees::{compute_fee, invoice_number};
use crate::models::{
    CreateInvoice, Invoice, PaymentMethodType, Payout, PayoutFilter, PayoutStatus, PayoutUpdate,
    PayoutWithPartner, PlanTier, ProgramSummary,
};
use crate::services::metrics::{record_error, INVOICES_CREATED_TOTAL, INVOICE_AMOUNT_TOTAL};
use crate::services::notifications::{NotificationJob, NotificationQueue, PayoutEmail};
use crate::services::processor::{ChargeRequest, PaymentProcessor, ProcessorError};
use crate::services::store::Store;

const CURRENCY: &str = "usd";

#[derive(Debug, Clone)]
pub struct ConfirmPayouts {
    pub workspace_id: Uuid,
    pub payment_method_id: String,
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct PayoutService {
    store: Arc<dyn Store>,
    processor: Arc<dyn PaymentProcessor>,
    notifications: NotificationQueue,
    statement_descriptor: String,
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn Store>,
        processor: Arc<dyn PaymentProcessor>,
        notifications: NotificationQueue,
        statement_descriptor: String,
    ) -> Self {
        Self {
            store,
            processor,
            notifications,
            statement_descriptor,
        }
    }

    /// Batch every eligible pending payout of the workspace's default program
    /// into one invoice and charge the given payment method for it.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn confirm_payouts(&self, input: ConfirmPayouts) -> Result<Invoice, AppError> {
        let workspace = self
            .store
            .get_workspace(input.workspace_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Workspace not found")))?;

        let program = self
            .store
            .default_program(workspace.id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Program not found")))?;

        let customer = workspace
            .stripe_customer_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Workspace does not have a valid Stripe ID."
                ))
            })?;

        let method = match self
            .processor
            .retrieve_payment_method(&input.payment_method_id)
            .await
        {
            Ok(method) => method,
            Err(ProcessorError::NotFound(_)) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invalid payout method."
                )))
            }
            Err(e) => {
                record_error("processor");
                return Err(AppError::BadGateway(e.to_string()));
            }
        };

        if method.customer.as_deref() != Some(customer.as_str()) {
            warn!(
                payment_method_id = %method.id,
                "Payment method belongs to another customer"
            );
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid payout method."
            )));
        }

        let method_type: PaymentMethodType = method.method_type.parse().map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!(
                "We only support ACH and Card for now. Please update your payout method to one of these."
            ))
        })?;

        let payouts = self
            .store
            .eligible_payouts(program.id, program.min_payout_amount)
            .await?;

        if payouts.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "No pending payouts found."
            )));
        }

        let amount: i64 = payouts.iter().map(|p| p.amount).sum();
        let rate = PlanTier::from_plan(workspace.plan.as_deref()).fee_rate(method_type.category());
        let fee = compute_fee(amount, rate).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Fee overflow for amount {}", amount))
        })?;
        let payout_ids: Vec<Uuid> = payouts.iter().map(|p| p.id).collect();

        let mut tx = self.store.begin().await?;

        let existing = tx.count_invoices(workspace.id).await?;
        let invoice = tx
            .insert_invoice(&CreateInvoice {
                id: Uuid::new_v4(),
                workspace_id: workspace.id,
                program_id: program.id,
                number: invoice_number(&workspace.invoice_prefix, existing),
                amount,
                fee,
                payment_method_id: method.id.clone(),
            })
            .await?;

        let assigned = tx
            .assign_payouts_to_invoice(&payout_ids, invoice.id, input.user_id.as_deref())
            .await?;

        if assigned != payout_ids.len() as u64 {
            warn!(
                expected = payout_ids.len(),
                assigned = assigned,
                "Payouts changed while confirming, aborting"
            );
            record_error("confirm_conflict");
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Some payouts were already confirmed. Please refresh and try again."
            )));
        }

        let charge = self
            .processor
            .create_charge(&ChargeRequest {
                amount: invoice.total,
                currency: CURRENCY.to_string(),
                customer,
                payment_method: method.id.clone(),
                payment_method_types: PaymentMethodType::ALL.to_vec(),
                transfer_group: invoice.id.to_string(),
                statement_descriptor: self.statement_descriptor.clone(),
                description: format!(
                    "{} payout invoice ({})",
                    self.statement_descriptor, invoice.id
                ),
                idempotency_key: invoice.id.to_string(),
            })
            .await
            .map_err(|e| {
                record_error("processor");
                AppError::BadGateway(e.to_string())
            })?;

        if let Err(e) = tx.commit().await {
            record_error("commit_after_charge");
            error!(
                invoice_id = %invoice.id,
                number = %invoice.number,
                charge_id = %charge.id,
                amount = invoice.total,
                error = %e,
                "Charge succeeded but invoice commit failed; reconcile against the processor"
            );
            return Err(e);
        }

        INVOICES_CREATED_TOTAL
            .with_label_values(&[method_type.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[CURRENCY])
            .inc_by(invoice.total as f64);

        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            payouts = payout_ids.len(),
            amount = invoice.amount,
            fee = invoice.fee,
            charge_id = %charge.id,
            "Payout invoice created"
        );

        if method_type.is_bank_debit() {
            let emails: Vec<PayoutEmail> = payouts
                .into_iter()
                .filter_map(|p| {
                    p.partner_email.map(|email| PayoutEmail {
                        payout_id: p.id,
                        email,
                        amount: p.amount,
                        period_start: p.period_start,
                        period_end: p.period_end,
                    })
                })
                .collect();

            if !emails.is_empty() {
                self.notifications.enqueue(NotificationJob::PayoutConfirmed {
                    program: ProgramSummary::from(&program),
                    invoice_id: invoice.id,
                    payouts: emails,
                });
            }
        }

        Ok(invoice)
    }

    pub async fn list_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<PayoutWithPartner>, AppError> {
        self.store.list_payouts(program_id, filter).await
    }

    pub async fn count_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<i64, AppError> {
        self.store.count_payouts(program_id, filter).await
    }

    /// One entry per status, in lifecycle order, including zero counts.
    pub async fn count_payouts_by_status(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<(PayoutStatus, i64)>, AppError> {
        let counts = self.store.count_payouts_by_status(program_id, filter).await?;

        Ok(PayoutStatus::ALL
            .into_iter()
            .map(|status| {
                let count = counts
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map_or(0, |(_, c)| *c);
                (status, count)
            })
            .collect())
    }

    /// Settle a payout outside the processor flow.
    #[instrument(skip(self))]
    pub async fn mark_payout_paid(
        &self,
        program_id: Uuid,
        payout_id: Uuid,
        user_id: Option<String>,
    ) -> Result<Payout, AppError> {
        let payout = self
            .store
            .get_payout(payout_id)
            .await?
            .filter(|p| p.program_id == program_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payout not found")))?;

        if !payout.status.is_payable() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only pending or failed payouts can be marked as paid."
            )));
        }

        let mut tx = self.store.begin().await?;
        let updated = tx
            .transition_payout(
                payout_id,
                &[PayoutStatus::Pending, PayoutStatus::Failed],
                &PayoutUpdate {
                    status: PayoutStatus::Completed,
                    paypal_transfer_id: None,
                    paid_at: Some(Utc::now()),
                    user_id,
                },
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict(anyhow::anyhow!("Payout status changed, please refresh."))
            })?;
        let commissions = tx.mark_commissions_paid(payout_id).await?;
        tx.commit().await?;

        info!(
            payout_id = %payout_id,
            commissions = commissions,
            "Payout marked as paid"
        );

        Ok(updated)
    }
}
