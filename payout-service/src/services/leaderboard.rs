use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::LeaderboardPartner;
use crate::models::LeaderboardRow;
use crate::services::metrics::record_error;
use crate::services::names::pseudonym;
use crate::services::store::Store;

pub const LEADERBOARD_SIZE: i64 = 20;

#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn Store>,
    avatar_base_url: String,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn Store>, avatar_base_url: String) -> Self {
        Self {
            store,
            avatar_base_url,
        }
    }

    /// Top partners of a program with pseudonymized identities.
    #[instrument(skip(self))]
    pub async fn leaderboard(&self, program_id: Uuid) -> Result<Vec<LeaderboardPartner>, AppError> {
        self.store
            .get_program(program_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Program not found")))?;

        let rows = self.store.leaderboard(program_id, LEADERBOARD_SIZE).await?;

        rows.into_iter()
            .map(|row| self.to_public(row))
            .collect()
    }

    fn to_public(&self, row: LeaderboardRow) -> Result<LeaderboardPartner, AppError> {
        let partner = LeaderboardPartner {
            id: row.partner_id,
            name: pseudonym(row.partner_id),
            image: format!("{}{}", self.avatar_base_url, row.partner_id),
            clicks: row.clicks,
            leads: row.leads,
            sales: row.sales,
            sale_amount: row.sale_amount,
        };

        partner.validate().map_err(|e| {
            error!(partner_id = %row.partner_id, error = %e, "Leaderboard row failed validation");
            record_error("leaderboard_validation");
            AppError::InternalError(anyhow::anyhow!("Invalid leaderboard row: {}", e))
        })?;

        Ok(partner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrollmentStatus, Link, Partner, Program, ProgramEnrollment};
    use crate::services::store::{MemoryState, MemoryStore};
    use chrono::Utc;

    fn program() -> Program {
        Program {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            name: "Acme".to_string(),
            logo: None,
            min_payout_amount: 0,
            default_reward_id: None,
            created_at: Utc::now(),
        }
    }

    fn partner() -> Partner {
        Partner {
            id: Uuid::new_v4(),
            name: "Real Name".to_string(),
            email: None,
            image: None,
            payouts_enabled_at: None,
        }
    }

    fn seeded(clicks: i64) -> (MemoryStore, Uuid, Uuid) {
        let program = program();
        let partner = partner();
        let state = MemoryState {
            enrollments: vec![ProgramEnrollment {
                program_id: program.id,
                partner_id: partner.id,
                status: EnrollmentStatus::Approved,
            }],
            links: vec![Link {
                id: Uuid::new_v4(),
                program_id: program.id,
                partner_id: partner.id,
                clicks,
                leads: 1,
                sales: 1,
                sale_amount: 5_000,
            }],
            programs: vec![program.clone()],
            partners: vec![partner.clone()],
            ..Default::default()
        };
        (MemoryStore::with_state(state), program.id, partner.id)
    }

    #[tokio::test]
    async fn rows_are_pseudonymized() {
        let (store, program_id, partner_id) = seeded(10);
        let service = LeaderboardService::new(Arc::new(store), "https://avatar.example/".into());

        let rows = service.leaderboard(program_id).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, pseudonym(partner_id));
        assert_ne!(rows[0].name, "Real Name");
        assert_eq!(rows[0].image, format!("https://avatar.example/{}", partner_id));
    }

    #[tokio::test]
    async fn negative_counters_fail_loudly() {
        let (store, program_id, _) = seeded(-5);
        let service = LeaderboardService::new(Arc::new(store), "https://avatar.example/".into());

        let err = service.leaderboard(program_id).await.unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }

    #[tokio::test]
    async fn unknown_program_is_not_found() {
        let service = LeaderboardService::new(
            Arc::new(MemoryStore::new()),
            "https://avatar.example/".into(),
        );

        let err = service.leaderboard(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
