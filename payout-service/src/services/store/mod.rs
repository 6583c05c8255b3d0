//! Persistence for payouts, invoices and program data.
//!
//! Multi-row writes go through a [`StoreTx`]. A transaction that is dropped
//! without [`StoreTx::commit`] is rolled back.

mod memory;
mod postgres;

pub use memory::{MemoryState, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CreateInvoice, CreateReward, EligiblePayout, Invoice, LeaderboardRow, Partner, Payout,
    PayoutFilter, PayoutStatus, PayoutUpdate, PayoutWithPartner, Program, Reward, Workspace,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError>;

    /// The workspace's first program by creation time.
    async fn default_program(&self, workspace_id: Uuid) -> Result<Option<Program>, AppError>;

    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, AppError>;

    async fn get_partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError>;

    async fn get_payout(&self, payout_id: Uuid) -> Result<Option<Payout>, AppError>;

    /// Pending, un-invoiced payouts of at least `min_amount` whose partner has payouts enabled.
    async fn eligible_payouts(
        &self,
        program_id: Uuid,
        min_amount: i64,
    ) -> Result<Vec<EligiblePayout>, AppError>;

    async fn list_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<PayoutWithPartner>, AppError>;

    async fn count_payouts(&self, program_id: Uuid, filter: &PayoutFilter)
        -> Result<i64, AppError>;

    /// Counts per status, for statuses with at least one matching payout.
    async fn count_payouts_by_status(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<(PayoutStatus, i64)>, AppError>;

    /// Approved partners ranked by sale amount, leads, clicks (descending), then id.
    async fn leaderboard(&self, program_id: Uuid, limit: i64)
        -> Result<Vec<LeaderboardRow>, AppError>;

    async fn list_rewards(&self, program_id: Uuid) -> Result<Vec<Reward>, AppError>;

    async fn get_reward(&self, program_id: Uuid, reward_id: Uuid)
        -> Result<Option<Reward>, AppError>;

    async fn create_reward(&self, input: &CreateReward) -> Result<Reward, AppError>;

    async fn update_reward(&self, reward: &Reward) -> Result<Reward, AppError>;

    async fn delete_reward(&self, program_id: Uuid, reward_id: Uuid) -> Result<bool, AppError>;

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn count_invoices(&mut self, workspace_id: Uuid) -> Result<i64, AppError>;

    async fn insert_invoice(&mut self, input: &CreateInvoice) -> Result<Invoice, AppError>;

    /// Moves the given payouts to `processing` under `invoice_id`. Only rows that are
    /// still pending and un-invoiced are touched; returns how many were.
    async fn assign_payouts_to_invoice(
        &mut self,
        payout_ids: &[Uuid],
        invoice_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<u64, AppError>;

    /// Applies `update` if the payout is currently in one of `from`.
    async fn transition_payout(
        &mut self,
        payout_id: Uuid,
        from: &[PayoutStatus],
        update: &PayoutUpdate,
    ) -> Result<Option<Payout>, AppError>;

    async fn mark_commissions_paid(&mut self, payout_id: Uuid) -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
