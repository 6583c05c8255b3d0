use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregated link counters for one approved partner of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub partner_id: Uuid,
    pub clicks: i64,
    pub leads: i64,
    pub sales: i64,
    pub sale_amount: i64,
}

impl LeaderboardRow {
    pub fn empty(partner_id: Uuid) -> Self {
        Self {
            partner_id,
            clicks: 0,
            leads: 0,
            sales: 0,
            sale_amount: 0,
        }
    }
}
