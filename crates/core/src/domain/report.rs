use crate::time::period::ReportPeriod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const TOP_CATEGORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFrequency {
    #[default]
    Monthly,
}

impl ReportFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFrequency::Monthly => "MONTHLY",
        }
    }

    /// "Monthly", as shown in email titles.
    pub fn label(&self) -> &'static str {
        match self {
            ReportFrequency::Monthly => "Monthly",
        }
    }
}

impl FromStr for ReportFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MONTHLY" => Ok(ReportFrequency::Monthly),
            other => anyhow::bail!("unknown report frequency: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Sent,
    Pending,
    Failed,
    NoActivity,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Sent => "SENT",
            ReportStatus::Pending => "PENDING",
            ReportStatus::Failed => "FAILED",
            ReportStatus::NoActivity => "NO_ACTIVITY",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SENT" => ReportStatus::Sent,
            "PENDING" => ReportStatus::Pending,
            "FAILED" => ReportStatus::Failed,
            "NO_ACTIVITY" => ReportStatus::NoActivity,
            other => anyhow::bail!("unknown report status: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
        }
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INR" => Ok(Currency::Inr),
            "USD" => Ok(Currency::Usd),
            other => anyhow::bail!("unknown currency: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSetting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub frequency: ReportFrequency,
    pub is_enabled: bool,
    pub next_report_date: Option<DateTime<Utc>>,
    pub last_sent_date: Option<DateTime<Utc>>,
}

/// A due setting together with its owner, fetched by an explicit join.
/// `user` is `None` when the owner row no longer resolves.
#[derive(Debug, Clone)]
pub struct DueReportSetting {
    pub setting: ReportSetting,
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReportRecord {
    pub user_id: Uuid,
    pub period: String,
    pub sent_date: DateTime<Utc>,
    pub status: ReportStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub period: String,
    pub sent_date: DateTime<Utc>,
    pub status: ReportStatus,
    pub detail: Option<String>,
}

/// Everything one outcome write needs: the audit row plus the schedule
/// change, applied together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub setting_id: Uuid,
    /// `next_report_date` as read by this run; the update only applies while
    /// the stored value still matches.
    pub observed_next_report_date: Option<DateTime<Utc>>,
    pub next_report_date: DateTime<Utc>,
    /// Set on the SENT path only; `None` leaves the stored value untouched.
    pub last_sent_date: Option<DateTime<Utc>>,
    pub record: NewReportRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeWrite {
    Recorded,
    /// Another run already moved the schedule; nothing was written.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReportData {
    pub period: ReportPeriod,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub available_balance: Decimal,
    /// Percentage of income kept, one decimal place; zero when there is no income.
    pub savings_rate: Decimal,
    pub top_categories: Vec<CategoryTotal>,
    pub insight: Option<String>,
}

impl AggregatedReportData {
    pub fn has_activity(&self) -> bool {
        !(self.total_income.is_zero() && self.total_expense.is_zero())
    }
}
