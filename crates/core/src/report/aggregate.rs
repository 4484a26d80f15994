use crate::domain::report::{AggregatedReportData, CategoryTotal, TOP_CATEGORY_LIMIT};
use crate::domain::transaction::{LedgerEntry, TransactionType};
use crate::storage::Store;
use crate::time::period::ReportPeriod;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Loads one user's ledger for `period` and summarizes it.
/// `Ok(None)` means the period had no activity.
pub async fn aggregate(
    store: &dyn Store,
    user_id: Uuid,
    period: ReportPeriod,
) -> anyhow::Result<Option<AggregatedReportData>> {
    let entries = store.ledger_entries(user_id, period).await?;
    Ok(summarize_entries(period, &entries))
}

pub fn summarize_entries(
    period: ReportPeriod,
    entries: &[LedgerEntry],
) -> Option<AggregatedReportData> {
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    let mut by_category: HashMap<&str, Decimal> = HashMap::new();

    for entry in entries.iter().filter(|e| period.contains(e.date)) {
        match entry.kind {
            TransactionType::Income => total_income += entry.amount,
            TransactionType::Expense => {
                total_expense += entry.amount;
                *by_category.entry(entry.category.as_str()).or_default() += entry.amount;
            }
        }
    }

    if total_income.is_zero() && total_expense.is_zero() {
        return None;
    }

    let mut top_categories: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();
    // Ties break by name so the same ledger always yields the same list.
    top_categories.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    top_categories.truncate(TOP_CATEGORY_LIMIT);

    let savings_rate = if total_income > Decimal::ZERO {
        ((total_income - total_expense) / total_income * Decimal::ONE_HUNDRED).round_dp(1)
    } else {
        Decimal::ZERO
    };

    Some(AggregatedReportData {
        period,
        total_income,
        total_expense,
        available_balance: total_income - total_expense,
        savings_rate,
        top_categories,
        insight: None,
    })
}
