//! Failure notification.
//!
//! On terminal failure the runner builds one structured summary and hands
//! it to the notifier; the transport (webhook) is the only thing that
//! lives here. Delivery problems are logged, never fatal.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::state::{ErrorRecord, RunState};

/// Errors from notification delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook rejected the notification ({status})")]
    Rejected { status: u16 },
}

/// Structured failure summary sent to the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Run that failed.
    pub run_id: String,
    /// Stage the run failed at.
    pub failed_stage: String,
    /// Trailing error records, oldest first.
    pub errors: Vec<ErrorRecord>,
    /// When the summary was produced (RFC 3339).
    pub timestamp: String,
}

impl FailureSummary {
    /// Build a summary from a failed run's state.
    pub fn from_state(state: &RunState, max_errors: usize) -> Self {
        let failed_stage = state
            .errors
            .last()
            .map(|e| e.stage.to_string())
            .unwrap_or_else(|| state.stage.to_string());

        Self {
            run_id: state.run_id.clone(),
            failed_stage,
            errors: state.last_errors(max_errors),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Notification sink for terminal failures.
pub trait Notifier: Send + Sync {
    /// Deliver one failure summary.
    fn notify(&self, summary: &FailureSummary) -> Result<(), NotifyError>;
}

/// Webhook notifier: POSTs the summary as JSON.
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, summary: &FailureSummary) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(summary)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunStage, Topic, TopicSource};

    #[test]
    fn summary_takes_trailing_errors_and_failed_stage() {
        let mut state = RunState::new(
            "short-20250101",
            Topic::new("volcanoes", "Science", TopicSource::Scheduled),
        );
        for i in 0..8 {
            state.record_error(RunStage::SynthesizingAudio, "neural-tts", format!("err {}", i));
        }
        state.record_error(RunStage::Publishing, "youtube", "upload rejected");

        let summary = FailureSummary::from_state(&state, 3);
        assert_eq!(summary.run_id, "short-20250101");
        assert_eq!(summary.failed_stage, "publishing");
        assert_eq!(summary.errors.len(), 3);
        assert_eq!(summary.errors[2].message, "upload rejected");
    }

    #[test]
    fn summary_serializes_for_the_wire() {
        let mut state = RunState::new(
            "run-1",
            Topic::new("t", "c", TopicSource::Override),
        );
        state.record_error(RunStage::Scripting, "openai", "timeout");

        let summary = FailureSummary::from_state(&state, 5);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"run_id\":\"run-1\""));
        assert!(json.contains("\"failed_stage\":\"scripting\""));
        assert!(json.contains("timeout"));
    }
}
