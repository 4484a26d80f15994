use chrono::{NaiveDate, Utc};
use ledgerbell_core::config::ReschedulePolicy;
use ledgerbell_core::email::ReportMailer;
use ledgerbell_core::jobs::{self, reports::DEFAULT_EMAIL_TIMEOUT, ReportDispatch};
use ledgerbell_core::report::InsightGenerator;
use ledgerbell_core::storage::job_runs::{self, JobRun};
use ledgerbell_core::storage::lock::try_acquire_job_lock;
use ledgerbell_core::storage::{PgStore, Store};
use serde::Serialize;
use std::future::Future;

/// Everything a trigger needs, built once in `main`.
pub struct Runtime<'a> {
    pub pg: &'a PgStore,
    pub store: &'a dyn Store,
    pub insights: InsightGenerator,
    pub mailer: Box<dyn ReportMailer>,
    pub policy: ReschedulePolicy,
    pub dry_run: bool,
}

impl Runtime<'_> {
    /// Daily trigger.
    pub async fn recurring(&self, today: NaiveDate) -> anyhow::Result<()> {
        self.guarded(jobs::RECURRING_JOB, || {
            jobs::materialize_recurring(self.store, today)
        })
        .await
    }

    /// Monthly trigger, meant to fire after month end.
    pub async fn reports(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        let dispatch = ReportDispatch {
            store: self.store,
            insights: &self.insights,
            mailer: self.mailer.as_ref(),
            policy: self.policy,
            email_timeout: DEFAULT_EMAIL_TIMEOUT,
        };
        self.guarded(jobs::REPORTS_JOB, || dispatch.run(now)).await
    }

    /// Runs `job` under the job's advisory lock and books the run in
    /// `job_runs`. A run that cannot take the lock is skipped.
    async fn guarded<T, F, Fut>(&self, job_name: &str, job: F) -> anyhow::Result<()>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let pool = self.pg.pool();
        let Some(lock) = try_acquire_job_lock(pool, job_name).await? else {
            tracing::warn!(job = job_name, "job lock not acquired; another run in progress");
            if !self.dry_run {
                let now = Utc::now();
                self.book(JobRun {
                    job_name,
                    started_at: now,
                    finished_at: now,
                    status: "skipped",
                    summary: None,
                    error: Some("lock held by another run"),
                })
                .await;
            }
            return Ok(());
        };

        match job_runs::last_successful_run(pool, job_name).await {
            Ok(Some(at)) => tracing::info!(job = job_name, last_success = %at, "starting job"),
            Ok(None) => tracing::info!(job = job_name, "starting job (no previous success)"),
            Err(err) => tracing::warn!(job = job_name, error = %format!("{err:#}"), "job history unavailable"),
        }

        let started_at = Utc::now();
        let result = job().await;
        let finished_at = Utc::now();

        let error_text = result.as_ref().err().map(|err| format!("{err:#}"));
        let summary = match &result {
            Ok(summary) => serde_json::to_value(summary).ok(),
            Err(_) => None,
        };

        if let Some(summary) = &summary {
            tracing::info!(job = job_name, dry_run = self.dry_run, %summary, "job finished");
        }

        if !self.dry_run {
            self.book(JobRun {
                job_name,
                started_at,
                finished_at,
                status: if result.is_ok() { "success" } else { "error" },
                summary,
                error: error_text.as_deref(),
            })
            .await;
        }

        if let Err(err) = lock.release().await {
            tracing::warn!(job = job_name, error = %format!("{err:#}"), "job lock release failed");
        }

        result.map(|_| ())
    }

    async fn book(&self, run: JobRun<'_>) {
        if let Err(err) = job_runs::record_job_run(self.pg.pool(), &run).await {
            tracing::warn!(job = run.job_name, error = %format!("{err:#}"), "job_runs insert failed");
        }
    }
}
