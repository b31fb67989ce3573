use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{render_report_text, ReportMailer};
use crate::config::EmailConfig;
use crate::domain::{Briefing, Report};

pub struct SmtpReportMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpReportMailer {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        if cfg.smtp_host.trim().is_empty() {
            return Err(anyhow!("email.smtp_host missing"));
        }
        let creds = Credentials::new(cfg.smtp_user.clone(), cfg.smtp_pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .context("invalid email.smtp_host")?
            .credentials(creds)
            .build();
        let from = cfg.from.parse().context("invalid email.from")?;
        Ok(Self { mailer, from })
    }
}

#[async_trait::async_trait]
impl ReportMailer for SmtpReportMailer {
    async fn send_report_email(&self, briefing: &Briefing, report: &Report) -> Result<()> {
        let Some(to_addr) = briefing.recipient_email.as_deref() else {
            tracing::debug!(target: "notify", briefing_id = %briefing.id, "no recipient, email skipped");
            return Ok(());
        };
        let to: Mailbox = to_addr.parse().context("invalid recipient address")?;

        let subject = format!(
            "Your briefing: {} item{}",
            report.items.len(),
            if report.items.len() == 1 { "" } else { "s" }
        );

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(render_report_text(briefing, report))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        tracing::info!(target: "notify", briefing_id = %briefing.id, report_id = %report.id, "report email sent");
        Ok(())
    }
}
