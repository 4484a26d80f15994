use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the lock holds on to
// the connection that took it. This is a best-effort guard against two
// overlapping runs of the same job.
const LOCK_NAMESPACE: i32 = 0x4C_4442; // "LDB"

pub struct JobLock {
    conn: PoolConnection<Postgres>,
    job_name: String,
}

pub async fn try_acquire_job_lock(
    pool: &sqlx::PgPool,
    job_name: &str,
) -> anyhow::Result<Option<JobLock>> {
    let mut conn = pool
        .acquire()
        .await
        .context("acquire connection for job lock failed")?;

    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1, hashtext($2))")
        .persistent(false)
        .bind(LOCK_NAMESPACE)
        .bind(job_name)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (job={job_name})"))?;

    Ok(acquired.0.then(|| JobLock {
        conn,
        job_name: job_name.to_string(),
    }))
}

impl JobLock {
    pub async fn release(mut self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1, hashtext($2))")
            .persistent(false)
            .bind(LOCK_NAMESPACE)
            .bind(&self.job_name)
            .execute(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (job={})", self.job_name))?;
        Ok(())
    }
}
