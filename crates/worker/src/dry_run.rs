use chrono::{DateTime, NaiveDate, Utc};
use ledgerbell_core::domain::report::{OutcomeWrite, ReportOutcome};
use ledgerbell_core::domain::transaction::{LedgerEntry, NewTransaction};
use ledgerbell_core::storage::{DueScan, Materialized, Store, TemplateScan};
use ledgerbell_core::time::period::ReportPeriod;
use uuid::Uuid;

/// Reads through to the wrapped store and logs every write instead of
/// performing it.
pub struct DryRunStore<S> {
    inner: S,
}

impl<S: Store> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl<S: Store> Store for DryRunStore<S> {
    async fn recurring_templates(&self) -> anyhow::Result<TemplateScan> {
        self.inner.recurring_templates().await
    }

    async fn find_materialized(
        &self,
        template_id: Uuid,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Uuid>> {
        self.inner.find_materialized(template_id, date).await
    }

    async fn insert_materialized(
        &self,
        transaction: &NewTransaction,
        next_recurring_date: NaiveDate,
    ) -> anyhow::Result<Materialized> {
        tracing::info!(
            template_id = ?transaction.recurring_parent_id,
            user_id = %transaction.user_id,
            date = %transaction.date,
            amount = %transaction.amount,
            %next_recurring_date,
            "dry-run: transaction not inserted"
        );
        Ok(Materialized::Inserted(Uuid::nil()))
    }

    async fn ledger_entries(
        &self,
        user_id: Uuid,
        period: ReportPeriod,
    ) -> anyhow::Result<Vec<LedgerEntry>> {
        self.inner.ledger_entries(user_id, period).await
    }

    async fn due_report_settings(&self, now: DateTime<Utc>) -> anyhow::Result<DueScan> {
        self.inner.due_report_settings(now).await
    }

    async fn record_report_outcome(&self, outcome: &ReportOutcome) -> anyhow::Result<OutcomeWrite> {
        tracing::info!(
            setting_id = %outcome.setting_id,
            status = %outcome.record.status,
            next_report_date = %outcome.next_report_date,
            period = %outcome.record.period,
            "dry-run: report outcome not recorded"
        );
        Ok(OutcomeWrite::Recorded)
    }
}
