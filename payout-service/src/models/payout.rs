//! Payout model for payout-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::PartnerSummary;

/// Payout status.
///
/// `pending → processing` happens only when the payout is batched into an
/// invoice. `processing → completed | failed | canceled | processing` happens
/// only through processor webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 5] = [
        PayoutStatus::Pending,
        PayoutStatus::Processing,
        PayoutStatus::Completed,
        PayoutStatus::Failed,
        PayoutStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Canceled
        )
    }

    /// Statuses from which a payout may be marked as paid by hand.
    pub fn is_payable(&self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::Failed)
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "processing" => Ok(PayoutStatus::Processing),
            "completed" => Ok(PayoutStatus::Completed),
            "failed" => Ok(PayoutStatus::Failed),
            "canceled" => Ok(PayoutStatus::Canceled),
            other => Err(format!("Unknown payout status: {}", other)),
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled disbursement to a partner for a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub program_id: Uuid,
    pub partner_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<String>,
    /// Minor currency units (cents).
    pub amount: i64,
    pub currency: String,
    pub status: PayoutStatus,
    pub paypal_transfer_id: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    pub fn new(program_id: Uuid, partner_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            program_id,
            partner_id,
            invoice_id: None,
            user_id: None,
            amount,
            currency: "usd".to_string(),
            status: PayoutStatus::Pending,
            paypal_transfer_id: None,
            period_start: None,
            period_end: None,
            paid_at: None,
            created_at: Utc::now(),
        }
    }
}

/// A pending payout selected for an invoice, with what the partner email needs.
#[derive(Debug, Clone)]
pub struct EligiblePayout {
    pub id: Uuid,
    pub amount: i64,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub partner_email: Option<String>,
}

/// A payout joined with its partner.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutWithPartner {
    #[serde(flatten)]
    pub payout: Payout,
    pub partner: PartnerSummary,
}

/// Field changes applied by a status transition. `None` leaves a column as is.
#[derive(Debug, Clone)]
pub struct PayoutUpdate {
    pub status: PayoutStatus,
    pub paypal_transfer_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
}

impl PayoutUpdate {
    pub fn status(status: PayoutStatus) -> Self {
        Self {
            status,
            paypal_transfer_id: None,
            paid_at: None,
            user_id: None,
        }
    }
}

/// Sortable columns of the payout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutSortBy {
    PeriodStart,
    #[default]
    Amount,
    PaidAt,
}

impl PayoutSortBy {
    pub fn column(&self) -> &'static str {
        match self {
            PayoutSortBy::PeriodStart => "period_start",
            PayoutSortBy::Amount => "amount",
            PayoutSortBy::PaidAt => "paid_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter parameters for listing payouts of a program.
#[derive(Debug, Clone)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub partner_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub sort_by: PayoutSortBy,
    pub sort_order: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

impl Default for PayoutFilter {
    fn default() -> Self {
        Self {
            status: None,
            partner_id: None,
            invoice_id: None,
            sort_by: PayoutSortBy::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: 100,
        }
    }
}

impl PayoutFilter {
    pub fn matches(&self, payout: &Payout) -> bool {
        self.status.map_or(true, |s| payout.status == s)
            && self.partner_id.map_or(true, |p| payout.partner_id == p)
            && self.invoice_id.map_or(true, |i| payout.invoice_id == Some(i))
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100) as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit()
    }
}
