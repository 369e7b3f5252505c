//! The run state record and per-stage artifact outputs.

use serde::{Deserialize, Serialize};

use crate::models::{CompositeVideo, NarrationAsset, PublishResult, RunStage, Topic, VisualAsset};

use super::store::StateError;

/// One recorded provider/stage error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Stage the error occurred in.
    pub stage: RunStage,
    /// Provider that failed (or a stage-level marker).
    pub provider_id: String,
    /// Human-readable error message.
    pub message: String,
    /// When the error was recorded (RFC 3339).
    pub timestamp: String,
}

/// Output of the scripting stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Generated script text.
    pub text: String,
    /// Provider that generated it.
    pub provider_id: String,
}

/// Output of the keyword extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordsOutput {
    /// Unique keywords in extraction rank order.
    pub keywords: Vec<String>,
    /// Provider that extracted them (None for the degraded default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Whether this is the degraded default (topic words).
    #[serde(default)]
    pub degraded: bool,
}

/// Output of the visual sourcing stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualsOutput {
    /// Sourced media in playback order. Empty for a degraded run (the
    /// compositor substitutes a generated background).
    pub assets: Vec<VisualAsset>,
    /// Whether the degraded default was substituted.
    #[serde(default)]
    pub degraded: bool,
}

/// Durable record of one pipeline run.
///
/// Mutated in place by each stage on completion and persisted after every
/// stage transition. Stages can add new data but never overwrite an
/// existing artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run identifier.
    pub run_id: String,
    /// Topic selected for this run (immutable).
    pub topic: Topic,
    /// Stage the run has reached.
    pub stage: RunStage,
    /// When the run started (RFC 3339).
    pub started_at: String,
    /// When the run reached a terminal stage (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Scripting output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptOutput>,
    /// Keyword extraction output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordsOutput>,
    /// Visual sourcing output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visuals: Option<VisualsOutput>,
    /// Narration synthesis output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationAsset>,
    /// Compositing output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeVideo>,
    /// Publish result. At most one per run, never overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishResult>,
    /// Provider and stage errors, in occurrence order.
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
}

impl RunState {
    /// Create a new run state at the initial stage.
    pub fn new(run_id: impl Into<String>, topic: Topic) -> Self {
        Self {
            run_id: run_id.into(),
            topic,
            stage: RunStage::SelectingTopic,
            started_at: chrono::Local::now().to_rfc3339(),
            finished_at: None,
            script: None,
            keywords: None,
            visuals: None,
            narration: None,
            composite: None,
            publish: None,
            errors: Vec::new(),
        }
    }

    /// Advance the stage marker forward.
    ///
    /// Stages are monotonic: moving to an earlier (or equal) stage is a
    /// programming error and is rejected. Transitioning to `Failed` is
    /// always allowed from a non-terminal stage.
    pub fn advance_to(&mut self, stage: RunStage) -> Result<(), StateError> {
        if self.stage.is_terminal() {
            return Err(StateError::StageRegression {
                from: self.stage,
                to: stage,
            });
        }
        if stage != RunStage::Failed && stage.ordinal() <= self.stage.ordinal() {
            return Err(StateError::StageRegression {
                from: self.stage,
                to: stage,
            });
        }

        self.stage = stage;
        if stage.is_terminal() {
            self.finished_at = Some(chrono::Local::now().to_rfc3339());
        }
        Ok(())
    }

    /// Append an error record.
    pub fn record_error(
        &mut self,
        stage: RunStage,
        provider_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(ErrorRecord {
            stage,
            provider_id: provider_id.into(),
            message: message.into(),
            timestamp: chrono::Local::now().to_rfc3339(),
        });
    }

    /// Last `n` error records, oldest first.
    pub fn last_errors(&self, n: usize) -> Vec<ErrorRecord> {
        let skip = self.errors.len().saturating_sub(n);
        self.errors[skip..].to_vec()
    }

    /// Check if a script has been recorded.
    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    /// Check if narration has been recorded.
    pub fn has_narration(&self) -> bool {
        self.narration.is_some()
    }

    /// Check if the composite video has been recorded.
    pub fn has_composite(&self) -> bool {
        self.composite.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicSource;

    fn test_state() -> RunState {
        RunState::new(
            "short-20250101",
            Topic::new("volcanoes", "Science", TopicSource::Scheduled),
        )
    }

    #[test]
    fn new_state_starts_at_topic_selection() {
        let state = test_state();
        assert_eq!(state.stage, RunStage::SelectingTopic);
        assert!(state.errors.is_empty());
        assert!(state.finished_at.is_none());
    }

    #[test]
    fn stage_advances_forward() {
        let mut state = test_state();
        state.advance_to(RunStage::Scripting).unwrap();
        state.advance_to(RunStage::ExtractingKeywords).unwrap();
        assert_eq!(state.stage, RunStage::ExtractingKeywords);
    }

    #[test]
    fn stage_never_regresses() {
        let mut state = test_state();
        state.advance_to(RunStage::Compositing).unwrap();
        let err = state.advance_to(RunStage::Scripting).unwrap_err();
        assert!(matches!(err, StateError::StageRegression { .. }));
    }

    #[test]
    fn failed_is_reachable_from_any_active_stage() {
        let mut state = test_state();
        state.advance_to(RunStage::SynthesizingAudio).unwrap();
        state.advance_to(RunStage::Failed).unwrap();
        assert!(state.stage.is_terminal());
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn terminal_state_is_frozen() {
        let mut state = test_state();
        state.advance_to(RunStage::Failed).unwrap();
        assert!(state.advance_to(RunStage::Publishing).is_err());
        assert!(state.advance_to(RunStage::Failed).is_err());
    }

    #[test]
    fn last_errors_keeps_tail() {
        let mut state = test_state();
        for i in 0..10 {
            state.record_error(RunStage::Scripting, "llm", format!("error {}", i));
        }
        let tail = state.last_errors(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].message, "error 7");
        assert_eq!(tail[2].message, "error 9");
    }

    #[test]
    fn state_serializes_without_absent_artifacts() {
        let state = test_state();
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("\"script\""));
        assert!(!json.contains("\"publish\""));
        assert!(json.contains("\"run_id\":\"short-20250101\""));
    }
}
