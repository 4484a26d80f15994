use crate::domain::transaction::{parse_interval, LedgerEntry, NewTransaction, RecurringTemplate};
use crate::storage::{InvalidTemplate, Materialized, TemplateScan};
use crate::time::period::ReportPeriod;
use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

type TemplateRow = (
    Uuid,
    Uuid,
    String,
    String,
    Decimal,
    String,
    Option<String>,
    String,
    Option<String>,
    NaiveDate,
    Option<NaiveDate>,
);

pub async fn list_recurring_templates(pool: &sqlx::PgPool) -> anyhow::Result<TemplateScan> {
    let rows = sqlx::query_as::<_, TemplateRow>(
        "SELECT id, user_id, title, type, amount, category, description, payment_method, \
                recurring_interval, COALESCE(recurring_start_date, date), last_processed \
         FROM transactions \
         WHERE is_recurring = TRUE \
         ORDER BY created_at ASC, id ASC",
    )
    .persistent(false)
    .fetch_all(pool)
    .await
    .context("select recurring transactions failed")?;

    Ok(rows.into_iter().map(decode_template).collect())
}

fn decode_template(row: TemplateRow) -> Result<RecurringTemplate, InvalidTemplate> {
    let id = row.0;
    template_from_row(row).map_err(|error| InvalidTemplate { id, error })
}

fn template_from_row(row: TemplateRow) -> anyhow::Result<RecurringTemplate> {
    let (
        id,
        user_id,
        title,
        kind,
        amount,
        category,
        description,
        payment_method,
        interval,
        anchor_date,
        last_processed,
    ) = row;

    Ok(RecurringTemplate {
        id,
        user_id,
        title,
        kind: kind.parse()?,
        amount,
        category,
        description,
        payment_method: payment_method.parse()?,
        interval: parse_interval(interval.as_deref())?,
        anchor_date,
        last_processed,
    })
}

pub async fn find_materialized(
    pool: &sqlx::PgPool,
    template_id: Uuid,
    date: NaiveDate,
) -> anyhow::Result<Option<Uuid>> {
    let id: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM transactions WHERE recurring_parent_id = $1 AND date = $2 LIMIT 1",
    )
    .persistent(false)
    .bind(template_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("lookup materialized child failed (template={template_id})"))?;
    Ok(id)
}

pub async fn insert_materialized(
    pool: &sqlx::PgPool,
    transaction: &NewTransaction,
    next_recurring_date: NaiveDate,
) -> anyhow::Result<Materialized> {
    let parent_id = transaction
        .recurring_parent_id
        .context("materialized transaction must reference its template")?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    // The partial unique index on (recurring_parent_id, date) turns a lost
    // check-then-act race into a no-op instead of a duplicate.
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO transactions \
            (id, user_id, title, type, amount, description, category, date, payment_method, \
             is_recurring, recurring_parent_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, $10) \
         ON CONFLICT (recurring_parent_id, date) WHERE recurring_parent_id IS NOT NULL DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(transaction.user_id)
    .bind(&transaction.title)
    .bind(transaction.kind.as_str())
    .bind(transaction.amount)
    .bind(&transaction.description)
    .bind(&transaction.category)
    .bind(transaction.date)
    .bind(transaction.payment_method.as_str())
    .bind(parent_id)
    .fetch_optional(&mut *tx)
    .await
    .context("insert materialized transaction failed")?;

    let Some(id) = inserted else {
        tx.rollback().await.context("rollback transaction failed")?;
        return Ok(Materialized::AlreadyExists);
    };

    sqlx::query(
        "UPDATE transactions \
         SET last_processed = $2, next_recurring_date = $3, updated_at = now() \
         WHERE id = $1",
    )
    .bind(parent_id)
    .bind(transaction.date)
    .bind(next_recurring_date)
    .execute(&mut *tx)
    .await
    .context("stamp recurring template failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(Materialized::Inserted(id))
}

pub async fn ledger_entries(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    period: ReportPeriod,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, (String, Decimal, String, NaiveDate)>(
        "SELECT type, amount, category, date \
         FROM transactions \
         WHERE user_id = $1 AND date >= $2 AND date <= $3",
    )
    .persistent(false)
    .bind(user_id)
    .bind(period.start)
    .bind(period.end)
    .fetch_all(pool)
    .await
    .with_context(|| format!("select transactions for report failed (user={user_id})"))?;

    rows.into_iter()
        .map(|(kind, amount, category, date)| -> anyhow::Result<LedgerEntry> {
            Ok(LedgerEntry {
                kind: kind.parse()?,
                amount,
                category,
                date,
            })
        })
        .collect()
}
