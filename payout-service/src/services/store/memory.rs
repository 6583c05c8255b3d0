//! In-memory store for local development and tests.
//!
//! A transaction holds the state lock for its whole lifetime and works on a
//! copy; commit swaps the copy in. Transactions are therefore serialized, and
//! callers must not use the store itself while holding one.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::models::{
    Commission, CommissionStatus, CreateInvoice, CreateReward, EligiblePayout, EnrollmentStatus,
    Invoice, LeaderboardRow, Link, Partner, PartnerSummary, Payout, PayoutFilter, PayoutSortBy,
    PayoutStatus, PayoutUpdate, PayoutWithPartner, Program, ProgramEnrollment, Reward, RewardEvent,
    SortOrder, Workspace,
};

/// Full contents of the memory store. Also the shape of the seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryState {
    pub workspaces: Vec<Workspace>,
    pub programs: Vec<Program>,
    pub partners: Vec<Partner>,
    pub enrollments: Vec<ProgramEnrollment>,
    pub links: Vec<Link>,
    pub invoices: Vec<Invoice>,
    pub payouts: Vec<Payout>,
    pub commissions: Vec<Commission>,
    pub rewards: Vec<Reward>,
}

impl MemoryState {
    fn partner(&self, partner_id: Uuid) -> Option<&Partner> {
        self.partners.iter().find(|p| p.id == partner_id)
    }

    fn program_payouts<'a>(
        &'a self,
        program_id: Uuid,
        filter: &'a PayoutFilter,
    ) -> impl Iterator<Item = &'a Payout> + 'a {
        self.payouts
            .iter()
            .filter(move |p| p.program_id == program_id && filter.matches(p))
    }

    fn has_program_wide_reward(
        &self,
        program_id: Uuid,
        event: RewardEvent,
        except: Option<Uuid>,
    ) -> bool {
        self.rewards.iter().any(|r| {
            r.program_id == program_id
                && r.event == event
                && r.is_program_wide()
                && Some(r.id) != except
        })
    }
}

fn program_wide_conflict() -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "A program-wide reward for this event already exists"
    ))
}

/// `None` sorts after every value regardless of direction.
fn compare_nullable<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match order {
            SortOrder::Asc => a.cmp(&b),
            SortOrder::Desc => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_payouts(a: &Payout, b: &Payout, sort_by: PayoutSortBy, order: SortOrder) -> Ordering {
    let primary = match sort_by {
        PayoutSortBy::Amount => compare_nullable(Some(a.amount), Some(b.amount), order),
        PayoutSortBy::PeriodStart => compare_nullable(a.period_start, b.period_start, order),
        PayoutSortBy::PaidAt => compare_nullable(a.paid_at, b.paid_at, order),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            fail_commits: Arc::default(),
        }
    }

    /// Make every later commit fail and discard its staged writes.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, AtomicOrdering::SeqCst);
    }

    /// Load a JSON seed file.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let state: MemoryState = serde_json::from_slice(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid seed file {}: {}",
                path.display(),
                e
            ))
        })?;

        info!(
            path = %path.display(),
            workspaces = state.workspaces.len(),
            payouts = state.payouts.len(),
            "Memory store seeded"
        );

        Ok(Self::with_state(state))
    }

    /// Mutate the state directly, outside of any transaction.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        let mut state = self.state.lock().await;
        f(&mut state);
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .workspaces
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned())
    }

    async fn default_program(&self, workspace_id: Uuid) -> Result<Option<Program>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .programs
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .min_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, AppError> {
        let state = self.state.lock().await;
        Ok(state.programs.iter().find(|p| p.id == program_id).cloned())
    }

    async fn get_partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError> {
        let state = self.state.lock().await;
        Ok(state.partner(partner_id).cloned())
    }

    async fn get_payout(&self, payout_id: Uuid) -> Result<Option<Payout>, AppError> {
        let state = self.state.lock().await;
        Ok(state.payouts.iter().find(|p| p.id == payout_id).cloned())
    }

    async fn eligible_payouts(
        &self,
        program_id: Uuid,
        min_amount: i64,
    ) -> Result<Vec<EligiblePayout>, AppError> {
        let state = self.state.lock().await;
        let mut eligible: Vec<(&Payout, &Partner)> = state
            .payouts
            .iter()
            .filter(|p| {
                p.program_id == program_id
                    && p.status == PayoutStatus::Pending
                    && p.invoice_id.is_none()
                    && p.amount >= min_amount
            })
            .filter_map(|p| {
                state
                    .partner(p.partner_id)
                    .filter(|partner| partner.payouts_enabled_at.is_some())
                    .map(|partner| (p, partner))
            })
            .collect();
        eligible.sort_by_key(|(p, _)| (p.created_at, p.id));

        Ok(eligible
            .into_iter()
            .map(|(p, partner)| EligiblePayout {
                id: p.id,
                amount: p.amount,
                period_start: p.period_start,
                period_end: p.period_end,
                partner_email: partner.email.clone(),
            })
            .collect())
    }

    async fn list_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<PayoutWithPartner>, AppError> {
        let state = self.state.lock().await;
        let mut payouts: Vec<&Payout> = state.program_payouts(program_id, filter).collect();
        payouts.sort_by(|a, b| compare_payouts(a, b, filter.sort_by, filter.sort_order));

        payouts
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .map(|p| {
                let partner = state.partner(p.partner_id).ok_or_else(|| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Payout {} references a missing partner",
                        p.id
                    ))
                })?;
                Ok(PayoutWithPartner {
                    payout: p.clone(),
                    partner: PartnerSummary::from(partner),
                })
            })
            .collect()
    }

    async fn count_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<i64, AppError> {
        let state = self.state.lock().await;
        Ok(state.program_payouts(program_id, filter).count() as i64)
    }

    async fn count_payouts_by_status(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<(PayoutStatus, i64)>, AppError> {
        let state = self.state.lock().await;
        let mut counts: HashMap<PayoutStatus, i64> = HashMap::new();
        for payout in state.program_payouts(program_id, filter) {
            *counts.entry(payout.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn leaderboard(
        &self,
        program_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let state = self.state.lock().await;
        let mut rows: Vec<LeaderboardRow> = state
            .enrollments
            .iter()
            .filter(|e| e.program_id == program_id && e.status == EnrollmentStatus::Approved)
            .map(|e| {
                state
                    .links
                    .iter()
                    .filter(|l| l.program_id == program_id && l.partner_id == e.partner_id)
                    .fold(LeaderboardRow::empty(e.partner_id), |mut row, link| {
                        row.clicks += link.clicks;
                        row.leads += link.leads;
                        row.sales += link.sales;
                        row.sale_amount += link.sale_amount;
                        row
                    })
            })
            .collect();

        rows.sort_by_key(|r| {
            (
                Reverse(r.sale_amount),
                Reverse(r.leads),
                Reverse(r.clicks),
                r.partner_id,
            )
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_rewards(&self, program_id: Uuid) -> Result<Vec<Reward>, AppError> {
        let state = self.state.lock().await;
        let mut rewards: Vec<Reward> = state
            .rewards
            .iter()
            .filter(|r| r.program_id == program_id)
            .cloned()
            .collect();
        rewards.sort_by_key(|r| (r.created_at, r.id));
        Ok(rewards)
    }

    async fn get_reward(
        &self,
        program_id: Uuid,
        reward_id: Uuid,
    ) -> Result<Option<Reward>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rewards
            .iter()
            .find(|r| r.program_id == program_id && r.id == reward_id)
            .cloned())
    }

    async fn create_reward(&self, input: &CreateReward) -> Result<Reward, AppError> {
        let mut state = self.state.lock().await;
        if input.partner_ids.is_empty()
            && state.has_program_wide_reward(input.program_id, input.event, None)
        {
            return Err(program_wide_conflict());
        }

        let now = Utc::now();
        let reward = Reward {
            id: Uuid::new_v4(),
            program_id: input.program_id,
            event: input.event,
            reward_type: input.reward_type,
            amount: input.amount,
            max_duration: input.max_duration,
            max_amount: input.max_amount,
            partner_ids: input.partner_ids.clone(),
            created_at: now,
            updated_at: now,
        };
        state.rewards.push(reward.clone());
        Ok(reward)
    }

    async fn update_reward(&self, reward: &Reward) -> Result<Reward, AppError> {
        let mut state = self.state.lock().await;
        if reward.is_program_wide()
            && state.has_program_wide_reward(reward.program_id, reward.event, Some(reward.id))
        {
            return Err(program_wide_conflict());
        }

        let stored = state
            .rewards
            .iter_mut()
            .find(|r| r.program_id == reward.program_id && r.id == reward.id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Reward not found")))?;

        stored.reward_type = reward.reward_type;
        stored.amount = reward.amount;
        stored.max_duration = reward.max_duration;
        stored.max_amount = reward.max_amount;
        stored.partner_ids = reward.partner_ids.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_reward(&self, program_id: Uuid, reward_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let before = state.rewards.len();
        state
            .rewards
            .retain(|r| !(r.program_id == program_id && r.id == reward_id));
        Ok(state.rewards.len() < before)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryStoreTx {
            guard,
            staged,
            fail_commit: self.fail_commits.load(AtomicOrdering::SeqCst),
        }))
    }
}

pub struct MemoryStoreTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_commit: bool,
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn count_invoices(&mut self, workspace_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .staged
            .invoices
            .iter()
            .filter(|i| i.workspace_id == workspace_id)
            .count() as i64)
    }

    async fn insert_invoice(&mut self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let duplicate = self
            .staged
            .invoices
            .iter()
            .any(|i| i.workspace_id == input.workspace_id && i.number == input.number);
        if duplicate {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already exists",
                input.number
            )));
        }

        let invoice = Invoice {
            id: input.id,
            workspace_id: input.workspace_id,
            program_id: input.program_id,
            number: input.number.clone(),
            amount: input.amount,
            fee: input.fee,
            total: input.total(),
            payment_method_id: input.payment_method_id.clone(),
            created_at: Utc::now(),
        };
        self.staged.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn assign_payouts_to_invoice(
        &mut self,
        payout_ids: &[Uuid],
        invoice_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<u64, AppError> {
        let mut affected = 0;
        for payout in self.staged.payouts.iter_mut().filter(|p| {
            payout_ids.contains(&p.id)
                && p.status == PayoutStatus::Pending
                && p.invoice_id.is_none()
        }) {
            payout.status = PayoutStatus::Processing;
            payout.invoice_id = Some(invoice_id);
            payout.user_id = user_id.map(str::to_string);
            affected += 1;
        }
        Ok(affected)
    }

    async fn transition_payout(
        &mut self,
        payout_id: Uuid,
        from: &[PayoutStatus],
        update: &PayoutUpdate,
    ) -> Result<Option<Payout>, AppError> {
        let Some(payout) = self
            .staged
            .payouts
            .iter_mut()
            .find(|p| p.id == payout_id && from.contains(&p.status))
        else {
            return Ok(None);
        };

        payout.status = update.status;
        if let Some(ref transfer_id) = update.paypal_transfer_id {
            payout.paypal_transfer_id = Some(transfer_id.clone());
        }
        if let Some(paid_at) = update.paid_at {
            payout.paid_at = Some(paid_at);
        }
        if let Some(ref user_id) = update.user_id {
            payout.user_id = Some(user_id.clone());
        }
        Ok(Some(payout.clone()))
    }

    async fn mark_commissions_paid(&mut self, payout_id: Uuid) -> Result<u64, AppError> {
        let mut affected = 0;
        for commission in self
            .staged
            .commissions
            .iter_mut()
            .filter(|c| c.payout_id == Some(payout_id))
        {
            commission.status = CommissionStatus::Paid;
            affected += 1;
        }
        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryStoreTx {
            mut guard,
            staged,
            fail_commit,
        } = *self;
        if fail_commit {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to commit transaction"
            )));
        }
        *guard = staged;
        Ok(())
    }
}
