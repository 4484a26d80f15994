use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct JobRun<'a> {
    pub job_name: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: &'a str,
    pub summary: Option<Value>,
    pub error: Option<&'a str>,
}

pub async fn record_job_run(pool: &sqlx::PgPool, run: &JobRun<'_>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO job_runs (id, job_name, started_at, finished_at, status, summary, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .persistent(false)
    .bind(id)
    .bind(run.job_name)
    .bind(run.started_at)
    .bind(run.finished_at)
    .bind(run.status)
    .bind(&run.summary)
    .bind(run.error)
    .execute(pool)
    .await
    .with_context(|| format!("insert job_runs failed (job={})", run.job_name))?;

    Ok(id)
}

/// When `job_name` last finished successfully, if ever.
pub async fn last_successful_run(
    pool: &sqlx::PgPool,
    job_name: &str,
) -> anyhow::Result<Option<DateTime<Utc>>> {
    let finished_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT max(finished_at) FROM job_runs WHERE job_name = $1 AND status = 'success'",
    )
    .persistent(false)
    .bind(job_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("select job_runs failed (job={job_name})"))?;
    Ok(finished_at)
}
