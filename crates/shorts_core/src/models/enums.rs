//! Enumerations shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Stage a run has reached.
///
/// Stages only ever advance forward; a failed stage moves the run to
/// `Failed`, never backwards or past `Publishing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Topic is being resolved (initial state).
    SelectingTopic,
    /// Script text is being generated.
    Scripting,
    /// Keywords are being extracted from the script.
    ExtractingKeywords,
    /// Visual media is being sourced for the keywords.
    SourcingMedia,
    /// Narration audio is being synthesized.
    SynthesizingAudio,
    /// Final video is being composited.
    Compositing,
    /// Video is being uploaded to the platform.
    Publishing,
    /// Run completed and published (terminal).
    Done,
    /// Run failed (terminal).
    Failed,
}

impl RunStage {
    /// Position in the forward progression (terminal states share the top).
    pub fn ordinal(&self) -> u8 {
        match self {
            RunStage::SelectingTopic => 0,
            RunStage::Scripting => 1,
            RunStage::ExtractingKeywords => 2,
            RunStage::SourcingMedia => 3,
            RunStage::SynthesizingAudio => 4,
            RunStage::Compositing => 5,
            RunStage::Publishing => 6,
            RunStage::Done => 7,
            RunStage::Failed => 7,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }

    /// The stage that follows this one on the success path.
    pub fn next(&self) -> Option<RunStage> {
        match self {
            RunStage::SelectingTopic => Some(RunStage::Scripting),
            RunStage::Scripting => Some(RunStage::ExtractingKeywords),
            RunStage::ExtractingKeywords => Some(RunStage::SourcingMedia),
            RunStage::SourcingMedia => Some(RunStage::SynthesizingAudio),
            RunStage::SynthesizingAudio => Some(RunStage::Compositing),
            RunStage::Compositing => Some(RunStage::Publishing),
            RunStage::Publishing => Some(RunStage::Done),
            RunStage::Done | RunStage::Failed => None,
        }
    }

    /// Stable name for logs and error records.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::SelectingTopic => "selecting_topic",
            RunStage::Scripting => "scripting",
            RunStage::ExtractingKeywords => "extracting_keywords",
            RunStage::SourcingMedia => "sourcing_media",
            RunStage::SynthesizingAudio => "synthesizing_audio",
            RunStage::Compositing => "compositing",
            RunStage::Publishing => "publishing",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run's topic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSource {
    /// Picked from the weekday rotation schedule.
    Scheduled,
    /// Picked from a trending feed.
    Trending,
    /// Supplied explicitly by the trigger.
    Override,
}

/// Privacy status for the published video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    /// API value expected by the upload endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_monotonically() {
        let order = [
            RunStage::SelectingTopic,
            RunStage::Scripting,
            RunStage::ExtractingKeywords,
            RunStage::SourcingMedia,
            RunStage::SynthesizingAudio,
            RunStage::Compositing,
            RunStage::Publishing,
            RunStage::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].ordinal() < pair[1].ordinal());
        }
    }

    #[test]
    fn terminal_states() {
        assert!(RunStage::Done.is_terminal());
        assert!(RunStage::Failed.is_terminal());
        assert!(!RunStage::Publishing.is_terminal());
    }

    #[test]
    fn success_path_reaches_done() {
        let mut stage = RunStage::SelectingTopic;
        let mut hops = 0;
        while let Some(next) = stage.next() {
            stage = next;
            hops += 1;
        }
        assert_eq!(stage, RunStage::Done);
        assert_eq!(hops, 7);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&RunStage::SourcingMedia).unwrap();
        assert_eq!(json, "\"sourcing_media\"");
    }
}
