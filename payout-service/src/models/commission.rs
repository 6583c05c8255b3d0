//! Commission model for payout-service.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Processed,
    Paid,
    Refunded,
    Duplicate,
    Fraud,
    Canceled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Processed => "processed",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Refunded => "refunded",
            CommissionStatus::Duplicate => "duplicate",
            CommissionStatus::Fraud => "fraud",
            CommissionStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "processed" => Ok(CommissionStatus::Processed),
            "paid" => Ok(CommissionStatus::Paid),
            "refunded" => Ok(CommissionStatus::Refunded),
            "duplicate" => Ok(CommissionStatus::Duplicate),
            "fraud" => Ok(CommissionStatus::Fraud),
            "canceled" => Ok(CommissionStatus::Canceled),
            other => Err(format!("Unknown commission status: {}", other)),
        }
    }
}

/// Earned reward that rolls up into a payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub program_id: Uuid,
    pub partner_id: Uuid,
    pub payout_id: Option<Uuid>,
    pub amount: i64,
    pub status: CommissionStatus,
}
