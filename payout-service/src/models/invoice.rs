//! Invoice model for payout-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch charge to the workspace covering a set of payouts plus the platform fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub program_id: Uuid,
    /// `{prefix}-{seq:04}`, unique per workspace.
    pub number: String,
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub payment_method_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub program_id: Uuid,
    pub number: String,
    pub amount: i64,
    pub fee: i64,
    pub payment_method_id: String,
}

impl CreateInvoice {
    pub fn total(&self) -> i64 {
        self.amount + self.fee
    }
}
