use crate::domain::report::{
    DueReportSetting, OutcomeWrite, ReportOutcome, ReportRecord, ReportSetting, User,
};
use crate::storage::{DueScan, InvalidSetting};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

type DueSettingRow = (
    Uuid,
    Uuid,
    String,
    bool,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    Option<String>,
);

pub async fn list_due_settings(
    pool: &sqlx::PgPool,
    now: DateTime<Utc>,
) -> anyhow::Result<DueScan> {
    let rows = sqlx::query_as::<_, DueSettingRow>(
        "SELECT s.id, s.user_id, s.frequency, s.is_enabled, s.next_report_date, s.last_sent_date, \
                u.id, u.email, u.name, u.currency \
         FROM report_settings s \
         LEFT JOIN users u ON u.id = s.user_id \
         WHERE s.is_enabled = TRUE AND s.next_report_date <= $1 \
         ORDER BY s.next_report_date ASC, s.id ASC",
    )
    .persistent(false)
    .bind(now)
    .fetch_all(pool)
    .await
    .context("select due report_settings failed")?;

    Ok(rows.into_iter().map(decode_due_setting).collect())
}

fn decode_due_setting(row: DueSettingRow) -> Result<DueReportSetting, InvalidSetting> {
    let (id, user_id) = (row.0, row.1);
    due_setting_from_row(row).map_err(|error| InvalidSetting { id, user_id, error })
}

fn due_setting_from_row(row: DueSettingRow) -> anyhow::Result<DueReportSetting> {
    let (
        id,
        user_id,
        frequency,
        is_enabled,
        next_report_date,
        last_sent_date,
        owner_id,
        email,
        name,
        currency,
    ) = row;

    let setting = ReportSetting {
        id,
        user_id,
        frequency: frequency
            .parse()
            .with_context(|| format!("report_settings row {id}"))?,
        is_enabled,
        next_report_date,
        last_sent_date,
    };

    let user = match (owner_id, email, name, currency) {
        (Some(id), Some(email), Some(name), Some(currency)) => Some(User {
            id,
            email,
            name,
            currency: currency
                .parse()
                .with_context(|| format!("users row {id}"))?,
        }),
        _ => None,
    };

    Ok(DueReportSetting { setting, user })
}

pub async fn record_outcome(
    pool: &sqlx::PgPool,
    outcome: &ReportOutcome,
) -> anyhow::Result<OutcomeWrite> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    // Compare-and-set on the schedule this run observed, so two overlapping
    // runs can never both advance it.
    let updated = sqlx::query(
        "UPDATE report_settings \
         SET next_report_date = $2, \
             last_sent_date = COALESCE($3, last_sent_date), \
             updated_at = now() \
         WHERE id = $1 AND next_report_date IS NOT DISTINCT FROM $4",
    )
    .bind(outcome.setting_id)
    .bind(outcome.next_report_date)
    .bind(outcome.last_sent_date)
    .bind(outcome.observed_next_report_date)
    .execute(&mut *tx)
    .await
    .context("update report_settings failed")?;

    if updated.rows_affected() == 0 {
        tx.rollback().await.context("rollback transaction failed")?;
        return Ok(OutcomeWrite::Superseded);
    }

    let record = &outcome.record;
    sqlx::query(
        "INSERT INTO reports (id, user_id, period, sent_date, status, detail) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(record.user_id)
    .bind(&record.period)
    .bind(record.sent_date)
    .bind(record.status.as_str())
    .bind(&record.detail)
    .execute(&mut *tx)
    .await
    .context("insert reports failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(OutcomeWrite::Recorded)
}

/// Report history for one user, newest first.
pub async fn list_reports_for_user(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<ReportRecord>> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>, String, Option<String>)>(
        "SELECT id, user_id, period, sent_date, status, detail \
         FROM reports \
         WHERE user_id = $1 \
         ORDER BY sent_date DESC, id DESC \
         LIMIT $2",
    )
    .persistent(false)
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .with_context(|| format!("select reports failed (user={user_id})"))?;

    rows.into_iter()
        .map(
            |(id, user_id, period, sent_date, status, detail)| -> anyhow::Result<ReportRecord> {
                Ok(ReportRecord {
                    id,
                    user_id,
                    period,
                    sent_date,
                    status: status.parse()?,
                    detail,
                })
            },
        )
        .collect()
}
