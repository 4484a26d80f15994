use crate::domain::report::AggregatedReportData;
use crate::email::INSIGHT_UNAVAILABLE;
use crate::llm::LlmClient;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 20;

pub const NO_ACTIVITY_INSIGHT: &str =
    "No transactions were recorded this period. Add your income and expenses to get personalized insights next month.";

/// Turns aggregated numbers into a short insight. Never fails: any problem
/// with the text service degrades to [`INSIGHT_UNAVAILABLE`].
#[derive(Clone)]
pub struct InsightGenerator {
    client: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl InsightGenerator {
    pub fn new(client: Option<Arc<dyn LlmClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Reads `INSIGHT_TIMEOUT_SECS` for the per-call deadline.
    pub fn from_env(client: Option<Arc<dyn LlmClient>>) -> Self {
        let timeout_secs = std::env::var("INSIGHT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_INSIGHT_TIMEOUT_SECS);
        Self::new(client, Duration::from_secs(timeout_secs))
    }

    pub async fn generate_insight(&self, data: &AggregatedReportData) -> String {
        if !data.has_activity() {
            return NO_ACTIVITY_INSIGHT.to_string();
        }

        let Some(client) = &self.client else {
            tracing::debug!("no text service configured; using fallback insight");
            return INSIGHT_UNAVAILABLE.to_string();
        };

        let prompt = build_prompt(data);
        match tokio::time::timeout(self.timeout, client.summarize(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                tracing::warn!(provider = client.provider().as_str(), "empty insight text");
                INSIGHT_UNAVAILABLE.to_string()
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    provider = client.provider().as_str(),
                    error = %format!("{err:#}"),
                    "insight generation failed"
                );
                INSIGHT_UNAVAILABLE.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    provider = client.provider().as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "insight generation timed out"
                );
                INSIGHT_UNAVAILABLE.to_string()
            }
        }
    }
}

pub fn build_prompt(data: &AggregatedReportData) -> String {
    let mut prompt = format!(
        "Analyze this financial data for {period} and write a brief insight.\n\
         Total income: {income}\n\
         Total expenses: {expense}\n\
         Net savings: {balance}\n\
         Savings rate: {rate}%\n",
        period = data.period,
        income = data.total_income,
        expense = data.total_expense,
        balance = data.available_balance,
        rate = data.savings_rate,
    );

    if data.top_categories.is_empty() {
        prompt.push_str("Expense categories: none\n");
    } else {
        prompt.push_str("Top expense categories:\n");
        for cat in &data.top_categories {
            prompt.push_str(&format!("- {}: {}\n", cat.category, cat.total));
        }
    }
    prompt
}
