//! Workspace, program and partner records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    /// Subscription plan label, e.g. "business plus". Selects the fee tier.
    pub plan: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub invoice_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub logo: Option<String>,
    /// Payouts below this amount (cents) are not batched.
    pub min_payout_amount: i64,
    pub default_reward_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub payouts_enabled_at: Option<DateTime<Utc>>,
}

/// Partner fields shown next to a payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub payouts_enabled_at: Option<DateTime<Utc>>,
}

impl From<&Partner> for PartnerSummary {
    fn from(p: &Partner) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            email: p.email.clone(),
            image: p.image.clone(),
            payouts_enabled_at: p.payouts_enabled_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
    Banned,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Approved => "approved",
            EnrollmentStatus::Rejected => "rejected",
            EnrollmentStatus::Banned => "banned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    pub program_id: Uuid,
    pub partner_id: Uuid,
    pub status: EnrollmentStatus,
}

/// Tracked link with its conversion counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub program_id: Uuid,
    pub partner_id: Uuid,
    pub clicks: i64,
    pub leads: i64,
    pub sales: i64,
    pub sale_amount: i64,
}

/// Program fields rendered in partner emails.
#[derive(Debug, Clone)]
pub struct ProgramSummary {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
}

impl From<&Program> for ProgramSummary {
    fn from(p: &Program) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            logo: p.logo.clone(),
        }
    }
}
