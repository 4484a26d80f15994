pub mod anthropic;
pub mod error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
        }
    }
}

/// External text-generation service. Every call is fallible and may be slow;
/// callers decide how to degrade.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn summarize(&self, prompt: &str) -> anyhow::Result<String>;
}
