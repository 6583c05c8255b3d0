//! Commission reward rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardEvent {
    Click,
    Lead,
    Sale,
}

impl RewardEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardEvent::Click => "click",
            RewardEvent::Lead => "lead",
            RewardEvent::Sale => "sale",
        }
    }

    /// Sales pay a share of the sale; clicks and leads pay a fixed amount.
    pub fn default_type(&self) -> RewardType {
        match self {
            RewardEvent::Sale => RewardType::Percentage,
            RewardEvent::Click | RewardEvent::Lead => RewardType::Flat,
        }
    }
}

impl FromStr for RewardEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click" => Ok(RewardEvent::Click),
            "lead" => Ok(RewardEvent::Lead),
            "sale" => Ok(RewardEvent::Sale),
            other => Err(format!("Unknown reward event: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Flat,
    Percentage,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Flat => "flat",
            RewardType::Percentage => "percentage",
        }
    }

    /// Upper bound of `amount`: cents for flat rewards, percent otherwise.
    pub fn max_amount(&self) -> i64 {
        match self {
            RewardType::Flat => 100_000,
            RewardType::Percentage => 100,
        }
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(RewardType::Flat),
            "percentage" => Ok(RewardType::Percentage),
            other => Err(format!("Unknown reward type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub program_id: Uuid,
    pub event: RewardEvent,
    pub reward_type: RewardType,
    pub amount: i64,
    /// Months the reward keeps paying. `None` is lifetime, `0` is one-off.
    pub max_duration: Option<i32>,
    pub max_amount: Option<i64>,
    /// Empty means the reward applies to every partner of the program.
    #[serde(default)]
    pub partner_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn is_program_wide(&self) -> bool {
        self.partner_ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CreateReward {
    pub program_id: Uuid,
    pub event: RewardEvent,
    pub reward_type: RewardType,
    pub amount: i64,
    pub max_duration: Option<i32>,
    pub max_amount: Option<i64>,
    pub partner_ids: Vec<Uuid>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateReward {
    pub reward_type: Option<RewardType>,
    pub amount: Option<i64>,
    pub max_duration: Option<Option<i32>>,
    pub max_amount: Option<Option<i64>>,
    pub partner_ids: Option<Vec<Uuid>>,
}

impl UpdateReward {
    pub fn apply(&self, reward: &mut Reward) {
        if let Some(reward_type) = self.reward_type {
            reward.reward_type = reward_type;
        }
        if let Some(amount) = self.amount {
            reward.amount = amount;
        }
        if let Some(max_duration) = self.max_duration {
            reward.max_duration = max_duration;
        }
        if let Some(max_amount) = self.max_amount {
            reward.max_amount = max_amount;
        }
        if let Some(ref partner_ids) = self.partner_ids {
            reward.partner_ids = partner_ids.clone();
        }
        reward.updated_at = Utc::now();
    }
}
