pub mod smtp;
pub mod template;

use crate::domain::report::{
    AggregatedReportData, CategoryTotal, Currency, ReportFrequency, User,
};
use crate::time::period::ReportPeriod;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

pub const INSIGHT_UNAVAILABLE: &str =
    "AI insights are temporarily unavailable. Your numbers above are complete and up to date.";

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("EmailError: Invalid destination address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("EmailError: Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("EmailError: Transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("EmailError: Timed out after {0:?}")]
    Timeout(Duration),
}

/// Everything the report email shows, composed from one user's aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEmail {
    pub recipient_email: String,
    pub recipient_name: String,
    pub frequency: ReportFrequency,
    pub period: ReportPeriod,
    pub currency: Currency,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub available_balance: Decimal,
    pub savings_rate: Decimal,
    pub top_categories: Vec<CategoryTotal>,
    pub insight: String,
}

impl ReportEmail {
    pub fn compose(user: &User, frequency: ReportFrequency, data: &AggregatedReportData) -> Self {
        Self {
            recipient_email: user.email.clone(),
            recipient_name: user.name.clone(),
            frequency,
            period: data.period,
            currency: user.currency,
            total_income: data.total_income,
            total_expense: data.total_expense,
            available_balance: data.available_balance,
            savings_rate: data.savings_rate,
            top_categories: data.top_categories.clone(),
            insight: data
                .insight
                .clone()
                .unwrap_or_else(|| INSIGHT_UNAVAILABLE.to_string()),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Your {} Financial Report: {}",
            self.frequency.label(),
            self.period.month_label()
        )
    }
}

/// Outbound delivery of report emails.
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report_email(&self, email: &ReportEmail) -> Result<(), EmailError>;
}

/// Logs instead of sending. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogMailer {}

impl LogMailer {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl ReportMailer for LogMailer {
    async fn send_report_email(&self, email: &ReportEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.recipient_email,
            subject = %email.subject(),
            income = %email.total_income,
            expense = %email.total_expense,
            savings_rate = %email.savings_rate,
            categories = email.top_categories.len(),
            "dry-run: report email not sent"
        );
        Ok(())
    }
}
