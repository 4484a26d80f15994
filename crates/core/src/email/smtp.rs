use crate::config::Settings;
use crate::email::{template, EmailError, ReportEmail, ReportMailer};
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let host = settings.require_smtp_host()?;
        let from = settings
            .require_report_email_from()?
            .parse::<Mailbox>()
            .context("REPORT_EMAIL_FROM must be a valid mailbox")?;

        let timeout_secs = std::env::var("SMTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS);

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP relay {host}"))?
            .port(settings.smtp_port)
            .timeout(Some(Duration::from_secs(timeout_secs)));

        if let (Some(username), Some(password)) = (&settings.smtp_username, &settings.smtp_password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report_email(&self, email: &ReportEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient_mailbox(email)?)
            .subject(email.subject())
            .header(ContentType::TEXT_HTML)
            .body(template::render_html(email))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn recipient_mailbox(email: &ReportEmail) -> Result<Mailbox, EmailError> {
    let address = email
        .recipient_email
        .trim()
        .parse::<Address>()
        .map_err(|source| EmailError::InvalidAddress {
            address: email.recipient_email.clone(),
            source,
        })?;
    let name = Some(email.recipient_name.clone()).filter(|n| !n.trim().is_empty());
    Ok(Mailbox::new(name, address))
}
