use crate::domain::transaction::RecurringTemplate;
use crate::storage::{Materialized, Store};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializeSummary {
    pub date: NaiveDate,
    pub templates_scanned: usize,
    pub created: usize,
    pub already_materialized: usize,
    pub not_due: usize,
    pub errors: usize,
}

impl MaterializeSummary {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            templates_scanned: 0,
            created: 0,
            already_materialized: 0,
            not_due: 0,
            errors: 0,
        }
    }
}

enum Step {
    NotDue,
    AlreadyMaterialized,
    Created(Uuid),
}

/// Produces today's occurrence for every due recurring template.
///
/// Safe to re-run for the same `today`: a template that already has a child
/// dated `today` is skipped. A failure on one template is logged and counted
/// and the scan moves on; only failing to list the templates aborts the run.
pub async fn materialize_recurring(
    store: &dyn Store,
    today: NaiveDate,
) -> anyhow::Result<MaterializeSummary> {
    let scan = store.recurring_templates().await?;
    let mut summary = MaterializeSummary::new(today);

    for item in scan {
        summary.templates_scanned += 1;

        let template = match item {
            Ok(t) => t,
            Err(invalid) => {
                summary.errors += 1;
                tracing::error!(
                    template_id = %invalid.id,
                    error = %format!("{:#}", invalid.error),
                    "skipping undecodable recurring template"
                );
                continue;
            }
        };

        match materialize_one(store, &template, today).await {
            Ok(Step::NotDue) => summary.not_due += 1,
            Ok(Step::AlreadyMaterialized) => {
                summary.already_materialized += 1;
                tracing::debug!(template_id = %template.id, %today, "already materialized");
            }
            Ok(Step::Created(id)) => {
                summary.created += 1;
                tracing::info!(
                    template_id = %template.id,
                    transaction_id = %id,
                    user_id = %template.user_id,
                    interval = template.interval.as_str(),
                    "materialized recurring transaction"
                );
            }
            Err(err) => {
                summary.errors += 1;
                tracing::error!(
                    template_id = %template.id,
                    error = %format!("{err:#}"),
                    "recurring template failed"
                );
            }
        }
    }

    tracing::info!(
        date = %summary.date,
        scanned = summary.templates_scanned,
        created = summary.created,
        already_materialized = summary.already_materialized,
        not_due = summary.not_due,
        errors = summary.errors,
        "recurring materialization done"
    );
    Ok(summary)
}

async fn materialize_one(
    store: &dyn Store,
    template: &RecurringTemplate,
    today: NaiveDate,
) -> anyhow::Result<Step> {
    if !template.interval.is_due(template.anchor_date, today) {
        return Ok(Step::NotDue);
    }

    if store.find_materialized(template.id, today).await?.is_some() {
        return Ok(Step::AlreadyMaterialized);
    }

    let next = template
        .interval
        .next_due_after(template.anchor_date, today)?;
    let child = template.materialize(today);

    Ok(match store.insert_materialized(&child, next).await? {
        Materialized::Inserted(id) => Step::Created(id),
        // Lost a race with an overlapping run between the check and the insert.
        Materialized::AlreadyExists => Step::AlreadyMaterialized,
    })
}
