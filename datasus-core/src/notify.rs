//! Run report notification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification is not configured")]
    NotConfigured,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport failed: {0}")]
    Transport(String),
}

/// A composed report, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub body: String,
    pub attachment: Vec<u8>,
    pub attachment_name: String,
}

/// Delivers reports to the operator.
pub trait Notifier {
    fn send(&self, report: &Report) -> Result<(), NotifyError>;
}

/// Used when no transport is configured; every send fails with
/// [`NotifyError::NotConfigured`] so the run log records it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send(&self, _report: &Report) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

/// Subject and body text for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportTemplate {
    pub subject_success: String,
    pub subject_failure: String,
    pub body: String,
    pub attachment_name: String,
}

impl Default for ReportTemplate {
    fn default() -> Self {
        Self {
            subject_success: "DATASUS - file extraction completed successfully".into(),
            subject_failure: "DATASUS - file extraction failed".into(),
            body: "Hello,\n\nAttached is the log of the automatic DATASUS \
                   extraction and conversion run.\n\nRegards"
                .into(),
            attachment_name: "log.txt".into(),
        }
    }
}

impl ReportTemplate {
    pub fn subject(&self, success: bool) -> &str {
        if success {
            &self.subject_success
        } else {
            &self.subject_failure
        }
    }

    /// Build the report for a run, attaching `log`.
    pub fn compose(&self, success: bool, log: impl Into<Vec<u8>>) -> Report {
        Report {
            subject: self.subject(success).to_string(),
            body: self.body.clone(),
            attachment: log.into(),
            attachment_name: self.attachment_name.clone(),
        }
    }
}
