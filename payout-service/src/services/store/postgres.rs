//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::models::{
    CreateInvoice, CreateReward, EligiblePayout, Invoice, LeaderboardRow, Partner,
    PartnerSummary, Payout, PayoutFilter, PayoutStatus, PayoutUpdate, PayoutWithPartner, Program,
    Reward, Workspace,
};
use crate::services::metrics::DB_QUERY_DURATION;

const PAYOUT_COLUMNS: &str = "p.payout_id, p.program_id, p.partner_id, p.invoice_id, p.user_id, \
     p.amount, p.currency, p.status, p.paypal_transfer_id, p.period_start, p.period_end, \
     p.paid_at, p.created_utc";

const PAYOUT_FILTER: &str = "p.program_id = $1 \
     AND ($2::TEXT IS NULL OR p.status = $2) \
     AND ($3::UUID IS NULL OR p.partner_id = $3) \
     AND ($4::UUID IS NULL OR p.invoice_id = $4)";

const REWARD_COLUMNS: &str = "reward_id, program_id, event, reward_type, amount, max_duration, \
     max_amount, partner_ids, created_utc, updated_utc";

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn corrupt_row(context: &str, e: String) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

#[derive(FromRow)]
struct WorkspaceRow {
    workspace_id: Uuid,
    name: String,
    plan: Option<String>,
    stripe_customer_id: Option<String>,
    invoice_prefix: String,
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        Self {
            id: row.workspace_id,
            name: row.name,
            plan: row.plan,
            stripe_customer_id: row.stripe_customer_id,
            invoice_prefix: row.invoice_prefix,
        }
    }
}

#[derive(FromRow)]
struct ProgramRow {
    program_id: Uuid,
    workspace_id: Uuid,
    name: String,
    logo: Option<String>,
    min_payout_amount: i64,
    default_reward_id: Option<Uuid>,
    created_utc: DateTime<Utc>,
}

impl From<ProgramRow> for Program {
    fn from(row: ProgramRow) -> Self {
        Self {
            id: row.program_id,
            workspace_id: row.workspace_id,
            name: row.name,
            logo: row.logo,
            min_payout_amount: row.min_payout_amount,
            default_reward_id: row.default_reward_id,
            created_at: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct PartnerRow {
    partner_id: Uuid,
    name: String,
    email: Option<String>,
    image: Option<String>,
    payouts_enabled_at: Option<DateTime<Utc>>,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: row.partner_id,
            name: row.name,
            email: row.email,
            image: row.image,
            payouts_enabled_at: row.payouts_enabled_at,
        }
    }
}

#[derive(FromRow)]
struct PayoutRow {
    payout_id: Uuid,
    program_id: Uuid,
    partner_id: Uuid,
    invoice_id: Option<Uuid>,
    user_id: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    paypal_transfer_id: Option<String>,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<PayoutRow> for Payout {
    type Error = AppError;

    fn try_from(row: PayoutRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PayoutStatus>()
            .map_err(|e| corrupt_row("Invalid payout row", e))?;

        Ok(Self {
            id: row.payout_id,
            program_id: row.program_id,
            partner_id: row.partner_id,
            invoice_id: row.invoice_id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            status,
            paypal_transfer_id: row.paypal_transfer_id,
            period_start: row.period_start,
            period_end: row.period_end,
            paid_at: row.paid_at,
            created_at: row.created_utc,
        })
    }
}

#[derive(FromRow)]
struct PayoutPartnerRow {
    #[sqlx(flatten)]
    payout: PayoutRow,
    partner_name: String,
    partner_email: Option<String>,
    partner_image: Option<String>,
    partner_payouts_enabled_at: Option<DateTime<Utc>>,
}

impl TryFrom<PayoutPartnerRow> for PayoutWithPartner {
    type Error = AppError;

    fn try_from(row: PayoutPartnerRow) -> Result<Self, Self::Error> {
        let partner = PartnerSummary {
            id: row.payout.partner_id,
            name: row.partner_name,
            email: row.partner_email,
            image: row.partner_image,
            payouts_enabled_at: row.partner_payouts_enabled_at,
        };
        Ok(Self {
            payout: Payout::try_from(row.payout)?,
            partner,
        })
    }
}

#[derive(FromRow)]
struct EligiblePayoutRow {
    payout_id: Uuid,
    amount: i64,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    partner_email: Option<String>,
}

#[derive(FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    workspace_id: Uuid,
    program_id: Uuid,
    number: String,
    amount: i64,
    fee: i64,
    total: i64,
    payment_method_id: String,
    created_utc: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.invoice_id,
            workspace_id: row.workspace_id,
            program_id: row.program_id,
            number: row.number,
            amount: row.amount,
            fee: row.fee,
            total: row.total,
            payment_method_id: row.payment_method_id,
            created_at: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardAggregateRow {
    partner_id: Uuid,
    clicks: i64,
    leads: i64,
    sales: i64,
    sale_amount: i64,
}

#[derive(FromRow)]
struct RewardRow {
    reward_id: Uuid,
    program_id: Uuid,
    event: String,
    reward_type: String,
    amount: i64,
    max_duration: Option<i32>,
    max_amount: Option<i64>,
    partner_ids: Vec<Uuid>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<RewardRow> for Reward {
    type Error = AppError;

    fn try_from(row: RewardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.reward_id,
            program_id: row.program_id,
            event: row
                .event
                .parse()
                .map_err(|e| corrupt_row("Invalid reward row", e))?,
            reward_type: row
                .reward_type
                .parse()
                .map_err(|e| corrupt_row("Invalid reward row", e))?,
            amount: row.amount,
            max_duration: row.max_duration,
            max_amount: row.max_amount,
            partner_ids: row.partner_ids,
            created_at: row.created_utc,
            updated_at: row.updated_utc,
        })
    }
}

fn reward_write_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            anyhow::anyhow!("A program-wide reward for this event already exists"),
        ),
        _ => db_error("Failed to write reward", e),
    }
}

/// Connection pool wrapper implementing [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "payout-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        let row = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            SELECT workspace_id, name, plan, stripe_customer_id, invoice_prefix
            FROM workspaces
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get workspace", e))?;

        Ok(row.map(Workspace::from))
    }

    #[instrument(skip(self))]
    async fn default_program(&self, workspace_id: Uuid) -> Result<Option<Program>, AppError> {
        let row = sqlx::query_as::<_, ProgramRow>(
            r#"
            SELECT program_id, workspace_id, name, logo, min_payout_amount, default_reward_id, created_utc
            FROM programs
            WHERE workspace_id = $1
            ORDER BY created_utc ASC, program_id ASC
            LIMIT 1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get default program", e))?;

        Ok(row.map(Program::from))
    }

    #[instrument(skip(self))]
    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, AppError> {
        let row = sqlx::query_as::<_, ProgramRow>(
            r#"
            SELECT program_id, workspace_id, name, logo, min_payout_amount, default_reward_id, created_utc
            FROM programs
            WHERE program_id = $1
            "#,
        )
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get program", e))?;

        Ok(row.map(Program::from))
    }

    #[instrument(skip(self))]
    async fn get_partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError> {
        let row = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT partner_id, name, email, image, payouts_enabled_at
            FROM partners
            WHERE partner_id = $1
            "#,
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get partner", e))?;

        Ok(row.map(Partner::from))
    }

    #[instrument(skip(self))]
    async fn get_payout(&self, payout_id: Uuid) -> Result<Option<Payout>, AppError> {
        let query = format!("SELECT {} FROM payouts p WHERE p.payout_id = $1", PAYOUT_COLUMNS);
        let row = sqlx::query_as::<_, PayoutRow>(&query)
            .bind(payout_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get payout", e))?;

        row.map(Payout::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn eligible_payouts(
        &self,
        program_id: Uuid,
        min_amount: i64,
    ) -> Result<Vec<EligiblePayout>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["eligible_payouts"])
            .start_timer();

        let rows = sqlx::query_as::<_, EligiblePayoutRow>(
            r#"
            SELECT p.payout_id, p.amount, p.period_start, p.period_end, pa.email AS partner_email
            FROM payouts p
            JOIN partners pa ON pa.partner_id = p.partner_id
            WHERE p.program_id = $1
              AND p.status = 'pending'
              AND p.invoice_id IS NULL
              AND p.amount >= $2
              AND pa.payouts_enabled_at IS NOT NULL
            ORDER BY p.created_utc ASC, p.payout_id ASC
            "#,
        )
        .bind(program_id)
        .bind(min_amount)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to select eligible payouts", e))?;

        timer.observe_duration();

        Ok(rows
            .into_iter()
            .map(|row| EligiblePayout {
                id: row.payout_id,
                amount: row.amount,
                period_start: row.period_start,
                period_end: row.period_end,
                partner_email: row.partner_email,
            })
            .collect())
    }

    #[instrument(skip(self, filter))]
    async fn list_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<PayoutWithPartner>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payouts"])
            .start_timer();

        let query = format!(
            r#"
            SELECT {columns},
                   pa.name AS partner_name,
                   pa.email AS partner_email,
                   pa.image AS partner_image,
                   pa.payouts_enabled_at AS partner_payouts_enabled_at
            FROM payouts p
            JOIN partners pa ON pa.partner_id = p.partner_id
            WHERE {filter}
            ORDER BY p.{sort} {order} NULLS LAST, p.payout_id ASC
            LIMIT $5 OFFSET $6
            "#,
            columns = PAYOUT_COLUMNS,
            filter = PAYOUT_FILTER,
            sort = filter.sort_by.column(),
            order = filter.sort_order.as_sql(),
        );

        let rows = sqlx::query_as::<_, PayoutPartnerRow>(&query)
            .bind(program_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.partner_id)
            .bind(filter.invoice_id)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list payouts", e))?;

        timer.observe_duration();

        rows.into_iter().map(PayoutWithPartner::try_from).collect()
    }

    #[instrument(skip(self, filter))]
    async fn count_payouts(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<i64, AppError> {
        let query = format!("SELECT COUNT(*) FROM payouts p WHERE {}", PAYOUT_FILTER);
        sqlx::query_scalar::<_, i64>(&query)
            .bind(program_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.partner_id)
            .bind(filter.invoice_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count payouts", e))
    }

    #[instrument(skip(self, filter))]
    async fn count_payouts_by_status(
        &self,
        program_id: Uuid,
        filter: &PayoutFilter,
    ) -> Result<Vec<(PayoutStatus, i64)>, AppError> {
        let query = format!(
            "SELECT p.status, COUNT(*) FROM payouts p WHERE {} GROUP BY p.status",
            PAYOUT_FILTER
        );
        let rows = sqlx::query_as::<_, (String, i64)>(&query)
            .bind(program_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.partner_id)
            .bind(filter.invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count payouts by status", e))?;

        rows.into_iter()
            .map(|(status, count)| {
                status
                    .parse::<PayoutStatus>()
                    .map(|s| (s, count))
                    .map_err(|e| corrupt_row("Invalid payout row", e))
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn leaderboard(
        &self,
        program_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["leaderboard"])
            .start_timer();

        let rows = sqlx::query_as::<_, LeaderboardAggregateRow>(
            r#"
            SELECT pe.partner_id,
                   COALESCE(SUM(l.clicks), 0)::BIGINT AS clicks,
                   COALESCE(SUM(l.leads), 0)::BIGINT AS leads,
                   COALESCE(SUM(l.sales), 0)::BIGINT AS sales,
                   COALESCE(SUM(l.sale_amount), 0)::BIGINT AS sale_amount
            FROM program_enrollments pe
            LEFT JOIN links l
                   ON l.program_id = pe.program_id AND l.partner_id = pe.partner_id
            WHERE pe.program_id = $1 AND pe.status = 'approved'
            GROUP BY pe.partner_id
            ORDER BY sale_amount DESC, leads DESC, clicks DESC, pe.partner_id ASC
            LIMIT $2
            "#,
        )
        .bind(program_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to rank partners", e))?;

        timer.observe_duration();

        Ok(rows
            .into_iter()
            .map(|row| LeaderboardRow {
                partner_id: row.partner_id,
                clicks: row.clicks,
                leads: row.leads,
                sales: row.sales,
                sale_amount: row.sale_amount,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_rewards(&self, program_id: Uuid) -> Result<Vec<Reward>, AppError> {
        let query = format!(
            "SELECT {} FROM rewards WHERE program_id = $1 ORDER BY created_utc ASC, reward_id ASC",
            REWARD_COLUMNS
        );
        let rows = sqlx::query_as::<_, RewardRow>(&query)
            .bind(program_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list rewards", e))?;

        rows.into_iter().map(Reward::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_reward(
        &self,
        program_id: Uuid,
        reward_id: Uuid,
    ) -> Result<Option<Reward>, AppError> {
        let query = format!(
            "SELECT {} FROM rewards WHERE program_id = $1 AND reward_id = $2",
            REWARD_COLUMNS
        );
        let row = sqlx::query_as::<_, RewardRow>(&query)
            .bind(program_id)
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get reward", e))?;

        row.map(Reward::try_from).transpose()
    }

    #[instrument(skip(self, input), fields(program_id = %input.program_id))]
    async fn create_reward(&self, input: &CreateReward) -> Result<Reward, AppError> {
        let query = format!(
            r#"
            INSERT INTO rewards (reward_id, program_id, event, reward_type, amount, max_duration, max_amount, partner_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            REWARD_COLUMNS
        );
        let row = sqlx::query_as::<_, RewardRow>(&query)
            .bind(Uuid::new_v4())
            .bind(input.program_id)
            .bind(input.event.as_str())
            .bind(input.reward_type.as_str())
            .bind(input.amount)
            .bind(input.max_duration)
            .bind(input.max_amount)
            .bind(&input.partner_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(reward_write_error)?;

        let reward = Reward::try_from(row)?;
        info!(reward_id = %reward.id, event = reward.event.as_str(), "Reward created");
        Ok(reward)
    }

    #[instrument(skip(self, reward), fields(reward_id = %reward.id))]
    async fn update_reward(&self, reward: &Reward) -> Result<Reward, AppError> {
        let query = format!(
            r#"
            UPDATE rewards
            SET reward_type = $3, amount = $4, max_duration = $5, max_amount = $6,
                partner_ids = $7, updated_utc = NOW()
            WHERE program_id = $1 AND reward_id = $2
            RETURNING {}
            "#,
            REWARD_COLUMNS
        );
        let row = sqlx::query_as::<_, RewardRow>(&query)
            .bind(reward.program_id)
            .bind(reward.id)
            .bind(reward.reward_type.as_str())
            .bind(reward.amount)
            .bind(reward.max_duration)
            .bind(reward.max_amount)
            .bind(&reward.partner_ids)
            .fetch_optional(&self.pool)
            .await
            .map_err(reward_write_error)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Reward not found")))?;

        Reward::try_from(row)
    }

    #[instrument(skip(self))]
    async fn delete_reward(&self, program_id: Uuid, reward_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM rewards WHERE program_id = $1 AND reward_id = $2")
            .bind(program_id)
            .bind(reward_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete reward", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

/// Open PostgreSQL transaction. Rolled back by sqlx on drop unless committed.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn count_invoices(&mut self, workspace_id: Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices WHERE workspace_id = $1")
            .bind(workspace_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to count invoices", e))
    }

    #[instrument(skip(self, input), fields(number = %input.number))]
    async fn insert_invoice(&mut self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            INSERT INTO invoices (invoice_id, workspace_id, program_id, number, amount, fee, total, payment_method_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING invoice_id, workspace_id, program_id, number, amount, fee, total, payment_method_id, created_utc
            "#,
        )
        .bind(input.id)
        .bind(input.workspace_id)
        .bind(input.program_id)
        .bind(&input.number)
        .bind(input.amount)
        .bind(input.fee)
        .bind(input.total())
        .bind(&input.payment_method_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number {} already exists",
                    input.number
                ))
            }
            _ => db_error("Failed to create invoice", e),
        })?;

        timer.observe_duration();

        Ok(Invoice::from(row))
    }

    #[instrument(skip(self, payout_ids), fields(count = payout_ids.len()))]
    async fn assign_payouts_to_invoice(
        &mut self,
        payout_ids: &[Uuid],
        invoice_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'processing', invoice_id = $2, user_id = $3
            WHERE payout_id = ANY($1) AND status = 'pending' AND invoice_id IS NULL
            "#,
        )
        .bind(payout_ids)
        .bind(invoice_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to assign payouts", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, from, update), fields(to = %update.status))]
    async fn transition_payout(
        &mut self,
        payout_id: Uuid,
        from: &[PayoutStatus],
        update: &PayoutUpdate,
    ) -> Result<Option<Payout>, AppError> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let query = format!(
            r#"
            UPDATE payouts p
            SET status = $2,
                paypal_transfer_id = COALESCE($3, p.paypal_transfer_id),
                paid_at = COALESCE($4, p.paid_at),
                user_id = COALESCE($5, p.user_id)
            WHERE p.payout_id = $1 AND p.status = ANY($6)
            RETURNING {}
            "#,
            PAYOUT_COLUMNS
        );

        let row = sqlx::query_as::<_, PayoutRow>(&query)
            .bind(payout_id)
            .bind(update.status.as_str())
            .bind(update.paypal_transfer_id.as_deref())
            .bind(update.paid_at)
            .bind(update.user_id.as_deref())
            .bind(&from)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to update payout", e))?;

        row.map(Payout::try_from).transpose()
    }

    async fn mark_commissions_paid(&mut self, payout_id: Uuid) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE commissions SET status = 'paid' WHERE payout_id = $1")
                .bind(payout_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to mark commissions paid", e))?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }
}
