//! Platform fee schedule and invoice numbering.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment method types accepted for invoice charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    UsBankAccount,
    Card,
    Link,
}

impl PaymentMethodType {
    pub const ALL: [PaymentMethodType; 3] = [
        PaymentMethodType::UsBankAccount,
        PaymentMethodType::Card,
        PaymentMethodType::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::UsBankAccount => "us_bank_account",
            PaymentMethodType::Card => "card",
            PaymentMethodType::Link => "link",
        }
    }

    pub fn category(&self) -> MethodCategory {
        match self {
            PaymentMethodType::UsBankAccount => MethodCategory::Ach,
            PaymentMethodType::Card | PaymentMethodType::Link => MethodCategory::Card,
        }
    }

    /// Bank debits settle asynchronously; partners are told their payout is on the way.
    pub fn is_bank_debit(&self) -> bool {
        matches!(self, PaymentMethodType::UsBankAccount)
    }
}

impl FromStr for PaymentMethodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us_bank_account" => Ok(PaymentMethodType::UsBankAccount),
            "card" => Ok(PaymentMethodType::Card),
            "link" => Ok(PaymentMethodType::Link),
            other => Err(format!("Unsupported payment method type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCategory {
    Ach,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Business,
    Advanced,
    Enterprise,
}

impl PlanTier {
    /// Tier from a workspace plan label. Matches the first word, ignoring case.
    /// Unknown or missing plans pay business rates.
    pub fn from_plan(plan: Option<&str>) -> Self {
        let first = plan
            .and_then(|p| p.split_whitespace().next())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match first.as_str() {
            "advanced" => PlanTier::Advanced,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Business,
        }
    }

    pub fn fee_rate(&self, category: MethodCategory) -> Decimal {
        let percent = match (self, category) {
            (PlanTier::Business, MethodCategory::Ach) => 5,
            (PlanTier::Business, MethodCategory::Card) => 8,
            (PlanTier::Advanced, MethodCategory::Ach) => 4,
            (PlanTier::Advanced, MethodCategory::Card) => 7,
            (PlanTier::Enterprise, MethodCategory::Ach) => 3,
            (PlanTier::Enterprise, MethodCategory::Card) => 6,
        };
        Decimal::new(percent, 2)
    }
}

/// Fee on `amount` cents, rounded to the nearest cent with halves away from zero.
pub fn compute_fee(amount: i64, rate: Decimal) -> Option<i64> {
    Decimal::from(amount)
        .checked_mul(rate)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Next invoice number for a workspace that already has `existing` invoices.
pub fn invoice_number(prefix: &str, existing: i64) -> String {
    format!("{}-{:04}", prefix, existing + 1)
}
