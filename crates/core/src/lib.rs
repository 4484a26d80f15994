pub mod domain;
pub mod email;
pub mod jobs;
pub mod llm;
pub mod report;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_SMTP_PORT: u16 = 587;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum ReschedulePolicy {
        /// Advance `next_report_date` after every recorded outcome, FAILED included.
        #[default]
        AlwaysAdvance,
        /// Leave the schedule untouched on FAILED so the next run re-attempts the cycle.
        RetryFailed,
    }

    impl std::str::FromStr for ReschedulePolicy {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "always_advance" => Ok(ReschedulePolicy::AlwaysAdvance),
                "retry_failed" => Ok(ReschedulePolicy::RetryFailed),
                other => anyhow::bail!(
                    "REPORT_RESCHEDULE_POLICY must be always_advance or retry_failed (got {other})"
                ),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub database_max_connections: u32,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub smtp_host: Option<String>,
        pub smtp_port: u16,
        pub smtp_username: Option<String>,
        pub smtp_password: Option<String>,
        pub report_email_from: Option<String>,
        pub reschedule_policy: ReschedulePolicy,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let database_max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
                Ok(s) => s
                    .parse::<u32>()
                    .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
                Err(_) => DEFAULT_DB_MAX_CONNECTIONS,
            };

            let smtp_port = match std::env::var("SMTP_PORT") {
                Ok(s) => s.parse::<u16>().context("SMTP_PORT must be a port number")?,
                Err(_) => DEFAULT_SMTP_PORT,
            };

            let reschedule_policy = match std::env::var("REPORT_RESCHEDULE_POLICY") {
                Ok(s) => s.parse()?,
                Err(_) => ReschedulePolicy::default(),
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                database_max_connections,
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                smtp_host: std::env::var("SMTP_HOST").ok(),
                smtp_port,
                smtp_username: std::env::var("SMTP_USERNAME").ok(),
                smtp_password: std::env::var("SMTP_PASSWORD").ok(),
                report_email_from: std::env::var("REPORT_EMAIL_FROM").ok(),
                reschedule_policy,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_smtp_host(&self) -> anyhow::Result<&str> {
            self.smtp_host.as_deref().context("SMTP_HOST is required")
        }

        pub fn require_report_email_from(&self) -> anyhow::Result<&str> {
            self.report_email_from
                .as_deref()
                .context("REPORT_EMAIL_FROM is required")
        }
    }

}
