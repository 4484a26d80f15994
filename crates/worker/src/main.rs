use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ledgerbell_core::config::Settings;
use ledgerbell_core::email::{smtp::SmtpMailer, LogMailer, ReportMailer};
use ledgerbell_core::llm::anthropic::AnthropicClient;
use ledgerbell_core::llm::LlmClient;
use ledgerbell_core::report::InsightGenerator;
use ledgerbell_core::storage::{reports, PgStore, Store};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod dry_run;
mod triggers;

#[derive(Debug, Parser)]
#[command(name = "ledgerbell_worker")]
struct Args {
    /// Read real data but write nothing and send no email.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Materialize today's recurring transactions (daily, e.g. `5 0 * * *`).
    Recurring {
        /// Run as of this date (YYYY-MM-DD). Defaults to today in UTC.
        #[arg(long)]
        date: Option<String>,
    },
    /// Send due monthly reports (monthly, e.g. `30 2 1 * *`).
    Reports {
        /// Run clock as RFC 3339. Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },
    /// Both jobs with the current clock.
    All,
    /// Print a user's most recent report records as JSON.
    History {
        #[arg(long)]
        user_id: Uuid,

        #[arg(long, default_value_t = 12)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let pg = PgStore::connect(&settings).await?;
    let result = run(&args, &settings, &pg).await;
    pg.close().await;

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    result
}

async fn run(args: &Args, settings: &Settings, pg: &PgStore) -> anyhow::Result<()> {
    if let Command::History { user_id, limit } = &args.command {
        let records = reports::list_reports_for_user(pg.pool(), *user_id, *limit).await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if !args.dry_run {
        pg.migrate().await?;
    }

    let dry = dry_run::DryRunStore::new(pg.clone());
    let store: &dyn Store = if args.dry_run { &dry } else { pg };

    let runtime = triggers::Runtime {
        pg,
        store,
        insights: InsightGenerator::from_env(build_llm(settings)),
        mailer: build_mailer(settings, args.dry_run)?,
        policy: settings.reschedule_policy,
        dry_run: args.dry_run,
    };

    match &args.command {
        Command::Recurring { date } => runtime.recurring(resolve_date(date.as_deref())?).await,
        Command::Reports { now } => runtime.reports(resolve_now(now.as_deref())?).await,
        Command::All => {
            let now = Utc::now();
            // The reports job still runs when materialization fails.
            let recurring = runtime.recurring(now.date_naive()).await;
            let reports = runtime.reports(now).await;
            recurring.and(reports)
        }
        Command::History { .. } => Ok(()),
    }
}

fn build_llm(settings: &Settings) -> Option<Arc<dyn LlmClient>> {
    if settings.anthropic_api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY not set; reports will use the fallback insight");
        return None;
    }
    match AnthropicClient::from_settings(settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "LLM client unavailable; using fallback insight");
            None
        }
    }
}

fn build_mailer(settings: &Settings, dry_run: bool) -> anyhow::Result<Box<dyn ReportMailer>> {
    if dry_run {
        return Ok(Box::new(LogMailer::new()));
    }
    let mailer = SmtpMailer::from_settings(settings).context("SMTP mailer setup failed")?;
    Ok(Box::new(mailer))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_date(arg: Option<&str>) -> anyhow::Result<NaiveDate> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--date must be YYYY-MM-DD (got {s})")),
        None => Ok(Utc::now().date_naive()),
    }
}

fn resolve_now(arg: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match arg {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("--now must be RFC 3339 (got {s})"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_cli_clocks() {
        assert_eq!(
            resolve_date(Some("2024-03-04")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert!(resolve_date(Some("04/03/2024")).is_err());
        assert_eq!(
            resolve_now(Some("2024-04-01T08:00:00+05:30")).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 2, 30, 0).unwrap()
        );
    }

    #[test]
    fn dry_run_flag_is_global() {
        let args = Args::try_parse_from(["ledgerbell_worker", "reports", "--dry-run"]).unwrap();
        assert!(args.dry_run);
        assert!(matches!(args.command, Command::Reports { now: None }));
    }
}
