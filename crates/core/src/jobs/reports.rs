use crate::config::ReschedulePolicy;
use crate::domain::report::{
    DueReportSetting, NewReportRecord, OutcomeWrite, ReportOutcome, ReportSetting, ReportStatus,
};
use crate::email::{EmailError, ReportEmail, ReportMailer};
use crate::report::{aggregate, InsightGenerator};
use crate::storage::Store;
use crate::time::interval::IntervalError;
use crate::time::period::{next_report_date, ReportPeriod};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_EMAIL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub no_activity: usize,
    /// Settings another run advanced between our read and our write.
    pub superseded: usize,
    pub errors: usize,
}

enum Dispatched {
    Recorded(ReportStatus),
    Superseded,
}

/// One pass over every due report setting.
pub struct ReportDispatch<'a> {
    pub store: &'a dyn Store,
    pub insights: &'a InsightGenerator,
    pub mailer: &'a dyn ReportMailer,
    pub policy: ReschedulePolicy,
    pub email_timeout: Duration,
}

impl ReportDispatch<'_> {
    /// Sends the previous month's report to every user whose setting is due
    /// at `now`. Each setting ends with exactly one audit row written together
    /// with its reschedule, or with nothing written at all when that write
    /// fails. Per-user failures are counted; only failing to list the due
    /// settings aborts the run.
    pub async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<DispatchSummary> {
        let due = self.store.due_report_settings(now).await?;
        let mut summary = DispatchSummary::default();

        for item in &due {
            summary.processed += 1;
            let entry = match item {
                Ok(entry) => entry,
                Err(invalid) => {
                    summary.errors += 1;
                    tracing::error!(
                        setting_id = %invalid.id,
                        user_id = %invalid.user_id,
                        error = %format!("{:#}", invalid.error),
                        "skipping undecodable report setting"
                    );
                    continue;
                }
            };
            let setting_id = entry.setting.id;
            let user_id = entry.setting.user_id;

            match self.dispatch_one(entry, now).await {
                Ok(Dispatched::Recorded(status)) => {
                    match status {
                        ReportStatus::Sent => summary.sent += 1,
                        ReportStatus::Failed => summary.failed += 1,
                        ReportStatus::NoActivity => summary.no_activity += 1,
                        ReportStatus::Pending => {}
                    }
                    tracing::info!(%setting_id, %user_id, %status, "report outcome recorded");
                }
                Ok(Dispatched::Superseded) => {
                    summary.superseded += 1;
                    tracing::warn!(
                        %setting_id,
                        %user_id,
                        "report schedule moved by another run; outcome discarded"
                    );
                }
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!(
                        %setting_id,
                        %user_id,
                        error = %format!("{err:#}"),
                        "report dispatch failed"
                    );
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            no_activity = summary.no_activity,
            superseded = summary.superseded,
            errors = summary.errors,
            "report dispatch done"
        );
        Ok(summary)
    }

    async fn dispatch_one(
        &self,
        due: &DueReportSetting,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Dispatched> {
        let setting = &due.setting;
        let user = due.user.as_ref().with_context(|| {
            format!(
                "owner {} of report setting {} not found",
                setting.user_id, setting.id
            )
        })?;

        let period = ReportPeriod::previous_month(now)?;

        let mut aggregation_error = None;
        let data = match aggregate(self.store, user.id, period).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %format!("{err:#}"),
                    "report aggregation failed"
                );
                aggregation_error = Some(format!("aggregation failed: {err:#}"));
                None
            }
        };

        let (status, detail) = match data {
            Some(mut data) => {
                data.insight = Some(self.insights.generate_insight(&data).await);
                let email = ReportEmail::compose(user, setting.frequency, &data);
                match self.deliver(&email).await {
                    Ok(()) => (ReportStatus::Sent, None),
                    Err(err) => {
                        tracing::warn!(user_id = %user.id, error = %err, "report email failed");
                        (ReportStatus::Failed, Some(err.to_string()))
                    }
                }
            }
            None => (ReportStatus::NoActivity, aggregation_error),
        };

        let outcome = plan_outcome(setting, period, status, detail, self.policy, now)?;
        Ok(match self.store.record_report_outcome(&outcome).await? {
            OutcomeWrite::Recorded => Dispatched::Recorded(status),
            OutcomeWrite::Superseded => Dispatched::Superseded,
        })
    }

    async fn deliver(&self, email: &ReportEmail) -> Result<(), EmailError> {
        match tokio::time::timeout(self.email_timeout, self.mailer.send_report_email(email)).await {
            Ok(delivered) => delivered,
            Err(_) => Err(EmailError::Timeout(self.email_timeout)),
        }
    }
}

/// The audit row and schedule change for one dispatch result.
///
/// SENT stamps `last_sent_date` and schedules the month after `now`. FAILED
/// and NO_ACTIVITY leave `last_sent_date` alone and schedule relative to the
/// run clock, except that FAILED under [`ReschedulePolicy::RetryFailed`]
/// keeps the current due date.
pub fn plan_outcome(
    setting: &ReportSetting,
    period: ReportPeriod,
    status: ReportStatus,
    detail: Option<String>,
    policy: ReschedulePolicy,
    now: DateTime<Utc>,
) -> Result<ReportOutcome, IntervalError> {
    let (next_report_date, last_sent_date) = match status {
        ReportStatus::Sent => (next_report_date(Some(now), now)?, Some(now)),
        ReportStatus::Failed if policy == ReschedulePolicy::RetryFailed => {
            let current = match setting.next_report_date {
                Some(current) => current,
                None => next_report_date(None, now)?,
            };
            (current, None)
        }
        _ => (next_report_date(None, now)?, None),
    };

    Ok(ReportOutcome {
        setting_id: setting.id,
        observed_next_report_date: setting.next_report_date,
        next_report_date,
        last_sent_date,
        record: NewReportRecord {
            user_id: setting.user_id,
            period: period.to_string(),
            sent_date: now,
            status,
            detail,
        },
    })
}
