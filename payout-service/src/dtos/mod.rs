use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    PayoutFilter, PayoutSortBy, PayoutStatus, RewardEvent, RewardType, SortOrder, UpdateReward,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPayoutsRequest {
    pub workspace_id: Uuid,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
    pub partner_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    #[serde(default)]
    pub sort_by: PayoutSortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub group_by: Option<CountGroupBy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountGroupBy {
    Status,
}

impl From<&PayoutListQuery> for PayoutFilter {
    fn from(query: &PayoutListQuery) -> Self {
        let defaults = PayoutFilter::default();
        PayoutFilter {
            status: query.status,
            partner_id: query.partner_id,
            invoice_id: query.invoice_id,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
            page: query.page.unwrap_or(defaults.page),
            page_size: query.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: PayoutStatus,
    pub count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRewardRequest {
    pub event: RewardEvent,
    /// Defaults by event when omitted.
    pub reward_type: Option<RewardType>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
    #[validate(range(min = 0, max = 120, message = "Duration must be between 0 and 120 months"))]
    pub max_duration: Option<i32>,
    #[validate(range(min = 0, message = "Max amount cannot be negative"))]
    pub max_amount: Option<i64>,
    #[serde(default)]
    pub partner_ids: Vec<Uuid>,
}

/// `null` clears `max_duration` / `max_amount`; an absent field keeps it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRewardRequest {
    pub reward_type: Option<RewardType>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    pub max_duration: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub max_amount: Option<Option<i64>>,
    pub partner_ids: Option<Vec<Uuid>>,
}

impl From<UpdateRewardRequest> for UpdateReward {
    fn from(req: UpdateRewardRequest) -> Self {
        UpdateReward {
            reward_type: req.reward_type,
            amount: req.amount,
            max_duration: req.max_duration,
            max_amount: req.max_amount,
            partner_ids: req.partner_ids,
        }
    }
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Public leaderboard row. Real partner names never leave the service.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct LeaderboardPartner {
    pub id: Uuid,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(url)]
    pub image: String,
    #[validate(range(min = 0))]
    pub clicks: i64,
    #[validate(range(min = 0))]
    pub leads: i64,
    #[validate(range(min = 0))]
    pub sales: i64,
    #[serde(rename = "saleAmount")]
    #[validate(range(min = 0))]
    pub sale_amount: i64,
}
