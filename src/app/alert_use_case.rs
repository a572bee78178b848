use std::sync::Arc;
use tracing::{error, info};

use crate::app::ports::{MailSenderPort, OutgoingMail};
use crate::common::constants::{ALERT_TRACE_LIMIT, NOTIFY_EMAIL_VAR};
use crate::common::error::AlertError;
use crate::observability::metrics::alerts as alert_metrics;
use crate::pipeline::ScraperError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Nothing failed, so nothing was sent
    Skipped,
    Sent { failures: usize },
}

/// Keep the tail of a trace, where the failing frame and message are.
pub fn truncate_trace(trace: &str, limit: usize) -> String {
    let total = trace.chars().count();
    if total <= limit {
        return trace.to_string();
    }
    let tail: String = trace.chars().skip(total - limit).collect();
    format!("...\n{tail}")
}

/// Build the single alert message for a non-empty list of failures.
pub fn build_alert_message(errors: &[ScraperError]) -> AlertMessage {
    let subject = format!("GigRadar: {} scraper(s) failed", errors.len());

    let mut body = format!(
        "{} scraper(s) failed during the last run.\n\n",
        errors.len()
    );
    for err in errors {
        let label = if err.trace.chars().count() > ALERT_TRACE_LIMIT {
            "Traceback (truncated)"
        } else {
            "Traceback"
        };
        body.push_str(&format!(
            "Scraper: {}\nError: {}\n\n{}:\n{}\n\n{}\n\n",
            err.unit_name,
            err.message,
            label,
            truncate_trace(&err.trace, ALERT_TRACE_LIMIT),
            "-".repeat(40)
        ));
    }

    AlertMessage { subject, body }
}

/// Use case turning the failures of a run into one outbound alert
pub struct AlertUseCase {
    mailer: Arc<dyn MailSenderPort>,
}

impl AlertUseCase {
    pub fn new(mailer: Arc<dyn MailSenderPort>) -> Self {
        Self { mailer }
    }

    /// Send one alert covering `errors` to `destination`.
    ///
    /// An empty list is a silent success. A missing destination is reported
    /// as `AlertError::ConfigMissing`, and transport errors are not retried.
    pub async fn send_scraper_alert(
        &self,
        errors: &[ScraperError],
        destination: Option<&str>,
    ) -> Result<AlertOutcome, AlertError> {
        if errors.is_empty() {
            info!("No scraper errors, skipping alert");
            alert_metrics::outcome("skipped");
            return Ok(AlertOutcome::Skipped);
        }

        let Some(to) = destination.map(str::trim).filter(|d| !d.is_empty()) else {
            error!("{} not set, cannot send alert", NOTIFY_EMAIL_VAR);
            alert_metrics::outcome("config_missing");
            return Err(AlertError::ConfigMissing(NOTIFY_EMAIL_VAR));
        };

        let message = build_alert_message(errors);
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: message.subject,
            body: message.body,
        };

        match self.mailer.send(&mail).await {
            Ok(()) => {
                info!("Sent alert for {} failed scraper(s) to {}", errors.len(), to);
                alert_metrics::outcome("sent");
                Ok(AlertOutcome::Sent {
                    failures: errors.len(),
                })
            }
            Err(e) => {
                error!("Failed to send alert: {}", e);
                alert_metrics::outcome("failed");
                Err(e)
            }
        }
    }
}
