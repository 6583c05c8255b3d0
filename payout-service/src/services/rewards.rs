//! Commission reward rules of a program.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::dtos::CreateRewardRequest;
use crate::models::{CreateReward, Program, Reward, RewardType, UpdateReward};
use crate::services::store::Store;

const MAX_DURATION_MONTHS: i32 = 120;

#[derive(Clone)]
pub struct RewardService {
    store: Arc<dyn Store>,
}

impl RewardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, program: &Program) -> Result<Vec<Reward>, AppError> {
        self.store.list_rewards(program.id).await
    }

    #[instrument(skip(self, program, req), fields(program_id = %program.id))]
    pub async fn create(
        &self,
        program: &Program,
        req: CreateRewardRequest,
    ) -> Result<Reward, AppError> {
        let input = CreateReward {
            program_id: program.id,
            event: req.event,
            reward_type: req.reward_type.unwrap_or_else(|| req.event.default_type()),
            amount: req.amount,
            max_duration: req.max_duration,
            max_amount: req.max_amount,
            partner_ids: req.partner_ids,
        };
        check_terms(input.reward_type, input.amount, input.max_duration, input.max_amount)?;

        let reward = self.store.create_reward(&input).await?;
        info!(
            reward_id = %reward.id,
            event = reward.event.as_str(),
            reward_type = reward.reward_type.as_str(),
            "Reward created"
        );
        Ok(reward)
    }

    #[instrument(skip(self, program, update), fields(program_id = %program.id))]
    pub async fn update(
        &self,
        program: &Program,
        reward_id: Uuid,
        update: UpdateReward,
    ) -> Result<Reward, AppError> {
        let mut reward = self.find(program, reward_id).await?;
        update.apply(&mut reward);
        check_terms(
            reward.reward_type,
            reward.amount,
            reward.max_duration,
            reward.max_amount,
        )?;

        let reward = self.store.update_reward(&reward).await?;
        info!(reward_id = %reward.id, "Reward updated");
        Ok(reward)
    }

    #[instrument(skip(self, program), fields(program_id = %program.id))]
    pub async fn delete(&self, program: &Program, reward_id: Uuid) -> Result<(), AppError> {
        if program.default_reward_id == Some(reward_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "The default reward of a program cannot be deleted."
            )));
        }

        if !self.store.delete_reward(program.id, reward_id).await? {
            return Err(AppError::NotFound(anyhow::anyhow!("Reward not found")));
        }
        info!(reward_id = %reward_id, "Reward deleted");
        Ok(())
    }

    async fn find(&self, program: &Program, reward_id: Uuid) -> Result<Reward, AppError> {
        self.store
            .get_reward(program.id, reward_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Reward not found")))
    }
}

fn check_terms(
    reward_type: RewardType,
    amount: i64,
    max_duration: Option<i32>,
    max_amount: Option<i64>,
) -> Result<(), AppError> {
    if !(0..=reward_type.max_amount()).contains(&amount) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Amount must be between 0 and {} for {} rewards.",
            reward_type.max_amount(),
            reward_type.as_str()
        )));
    }
    if let Some(months) = max_duration {
        if !(0..=MAX_DURATION_MONTHS).contains(&months) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Duration must be between 0 and {} months.",
                MAX_DURATION_MONTHS
            )));
        }
    }
    if max_amount.is_some_and(|cap| cap < 0) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Max amount cannot be negative."
        )));
    }
    Ok(())
}
