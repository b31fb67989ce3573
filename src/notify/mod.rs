// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use parking_lot::Mutex;

use crate::domain::{Briefing, BriefingId, Report, ReportId};

pub use email::SmtpReportMailer;

/// Best-effort delivery of a generated report to the briefing owner.
#[async_trait::async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report_email(&self, briefing: &Briefing, report: &Report) -> Result<()>;
}

/// Used when email delivery is disabled.
pub struct NoopMailer;

#[async_trait::async_trait]
impl ReportMailer for NoopMailer {
    async fn send_report_email(&self, briefing: &Briefing, report: &Report) -> Result<()> {
        tracing::debug!(
            target: "notify",
            briefing_id = %briefing.id,
            report_id = %report.id,
            "email disabled, report not sent"
        );
        Ok(())
    }
}

/// Plain-text digest shared by every mailer.
pub fn render_report_text(briefing: &Briefing, report: &Report) -> String {
    let mut body = format!(
        "{}\nGenerated: {}\n\n",
        if briefing.name.is_empty() { "Your briefing" } else { briefing.name.as_str() },
        report.generated_at.to_rfc3339()
    );
    if report.is_empty() {
        body.push_str("No new items in this period.\n");
        return body;
    }
    for it in &report.items {
        body.push_str(&format!("{}. {} ({:.2})\n", it.position, it.title, it.score));
        if let Some(link) = &it.link {
            body.push_str(&format!("   {link}\n"));
        }
    }
    body
}

// --- Test helpers ---

/// Records every call; optionally fails after recording.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(BriefingId, ReportId)>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: true,
        }
    }
}

impl Default for RecordingMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportMailer for RecordingMailer {
    async fn send_report_email(&self, briefing: &Briefing, report: &Report) -> Result<()> {
        self.sent.lock().push((briefing.id, report.id));
        if self.fail {
            anyhow::bail!("smtp unavailable");
        }
        Ok(())
    }
}
