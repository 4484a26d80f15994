pub mod job_runs;
pub mod lock;
pub mod reports;
pub mod transactions;

#[cfg(test)]
pub mod memory;

use crate::config::Settings;
use crate::domain::report::{DueReportSetting, OutcomeWrite, ReportOutcome};
use crate::domain::transaction::{LedgerEntry, NewTransaction, RecurringTemplate};
use crate::time::period::ReportPeriod;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use uuid::Uuid;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// A recurring row that could not be decoded into a template.
#[derive(Debug)]
pub struct InvalidTemplate {
    pub id: Uuid,
    pub error: anyhow::Error,
}

pub type TemplateScan = Vec<Result<RecurringTemplate, InvalidTemplate>>;

/// A due settings row that could not be decoded.
#[derive(Debug)]
pub struct InvalidSetting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub error: anyhow::Error,
}

pub type DueScan = Vec<Result<DueReportSetting, InvalidSetting>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Inserted(Uuid),
    AlreadyExists,
}

/// The data-store operations the scheduler jobs depend on.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Every row flagged recurring, decoded individually.
    async fn recurring_templates(&self) -> anyhow::Result<TemplateScan>;

    async fn find_materialized(
        &self,
        template_id: Uuid,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Uuid>>;

    /// Inserts the child and stamps the parent's `last_processed` (the child's
    /// date) and `next_recurring_date` in one transaction.
    async fn insert_materialized(
        &self,
        transaction: &NewTransaction,
        next_recurring_date: NaiveDate,
    ) -> anyhow::Result<Materialized>;

    async fn ledger_entries(
        &self,
        user_id: Uuid,
        period: ReportPeriod,
    ) -> anyhow::Result<Vec<LedgerEntry>>;

    /// Enabled settings with `next_report_date <= now`, joined with their
    /// owner and decoded individually.
    async fn due_report_settings(&self, now: DateTime<Utc>) -> anyhow::Result<DueScan>;

    /// Advances the setting and inserts the audit row atomically.
    async fn record_report_outcome(&self, outcome: &ReportOutcome)
        -> anyhow::Result<OutcomeWrite>;
}

/// Postgres-backed store. Opened once at process start and closed on the way out.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        migrate(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn recurring_templates(&self) -> anyhow::Result<TemplateScan> {
        transactions::list_recurring_templates(&self.pool).await
    }

    async fn find_materialized(
        &self,
        template_id: Uuid,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Uuid>> {
        transactions::find_materialized(&self.pool, template_id, date).await
    }

    async fn insert_materialized(
        &self,
        transaction: &NewTransaction,
        next_recurring_date: NaiveDate,
    ) -> anyhow::Result<Materialized> {
        transactions::insert_materialized(&self.pool, transaction, next_recurring_date).await
    }

    async fn ledger_entries(
        &self,
        user_id: Uuid,
        period: ReportPeriod,
    ) -> anyhow::Result<Vec<LedgerEntry>> {
        transactions::ledger_entries(&self.pool, user_id, period).await
    }

    async fn due_report_settings(&self, now: DateTime<Utc>) -> anyhow::Result<DueScan> {
        reports::list_due_settings(&self.pool, now).await
    }

    async fn record_report_outcome(&self, outcome: &ReportOutcome) -> anyhow::Result<OutcomeWrite> {
        reports::record_outcome(&self.pool, outcome).await
    }
}
