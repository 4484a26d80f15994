use crate::time::interval::{IntervalError, RecurringInterval};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const AUTO_CREATED_NOTE: &str = "(Auto-created from recurring Transaction)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            other => anyhow::bail!("unknown transaction type: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    MobilePayment,
    AutoDebit,
    #[default]
    Cash,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::MobilePayment => "MOBILE_PAYMENT",
            PaymentMethod::AutoDebit => "AUTO_DEBIT",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CARD" => PaymentMethod::Card,
            "BANK_TRANSFER" => PaymentMethod::BankTransfer,
            "MOBILE_PAYMENT" => PaymentMethod::MobilePayment,
            "AUTO_DEBIT" => PaymentMethod::AutoDebit,
            "CASH" => PaymentMethod::Cash,
            "OTHER" => PaymentMethod::Other,
            other => anyhow::bail!("unknown payment method: {other}"),
        })
    }
}

/// A transaction row flagged recurring. The row itself is the occurrence on
/// `anchor_date`; the scheduler only ever stamps `last_processed` and
/// `next_recurring_date` on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub payment_method: PaymentMethod,
    pub interval: RecurringInterval,
    pub anchor_date: NaiveDate,
    pub last_processed: Option<NaiveDate>,
}

impl RecurringTemplate {
    /// The concrete transaction this template produces for `date`.
    pub fn materialize(&self, date: NaiveDate) -> NewTransaction {
        let description = match self.description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => format!("{d} {AUTO_CREATED_NOTE}"),
            _ => AUTO_CREATED_NOTE.to_string(),
        };

        NewTransaction {
            user_id: self.user_id,
            title: self.title.clone(),
            kind: self.kind,
            amount: self.amount,
            category: self.category.clone(),
            date,
            description,
            payment_method: self.payment_method,
            recurring_parent_id: Some(self.id),
        }
    }
}

/// A materialized transaction, always non-recurring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub title: String,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub recurring_parent_id: Option<Uuid>,
}

/// The slice of a transaction row the report aggregator reads.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub kind: TransactionType,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
}

/// Decodes the interval column of a recurring row.
pub fn parse_interval(raw: Option<&str>) -> Result<RecurringInterval, IntervalError> {
    match raw {
        Some(s) => s.parse(),
        None => Err(IntervalError::Missing),
    }
}
