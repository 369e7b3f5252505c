//! Publish stage - uploads the composite video.
//!
//! At-most-once: an already-recorded publish result blocks re-execution,
//! and the result is persisted immediately after the upload returns.

use std::time::Instant;

use crate::models::{PublishResult, RunStage};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::RunContext;
use crate::providers::{generate_metadata, FallbackChain, PublishRequest};
use crate::state::RunState;

/// Publishes the rendered video to the platform.
pub struct PublishStage {
    chain: FallbackChain<PublishRequest, PublishResult>,
}

impl PublishStage {
    pub fn new(chain: FallbackChain<PublishRequest, PublishResult>) -> Self {
        Self { chain }
    }
}

impl Stage for PublishStage {
    fn name(&self) -> &str {
        "Publish"
    }

    fn marker(&self) -> RunStage {
        RunStage::Publishing
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if state.publish.is_some() {
            return Err(StageError::invalid_input(
                "publish result already recorded for this run",
            ));
        }
        let composite = state
            .composite
            .as_ref()
            .ok_or_else(|| StageError::dependency_missing("publishing requires the composite"))?;
        if !composite.video_path.exists() {
            return Err(StageError::dependency_missing(format!(
                "composite file missing: {}",
                composite.video_path.display()
            )));
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        deadline: Instant,
    ) -> StageResult<()> {
        let composite = match state.composite {
            Some(ref composite) => composite.clone(),
            None => return Err(StageError::dependency_missing("composite disappeared")),
        };
        let script_text = state
            .script
            .as_ref()
            .map(|s| s.text.clone())
            .unwrap_or_default();

        let metadata = generate_metadata(&state.topic, &script_text);
        ctx.logger.info(&format!("Title: {}", metadata.title));

        let request = PublishRequest {
            video_path: composite.video_path,
            thumbnail_path: composite.thumbnail_path,
            title: metadata.title,
            description: metadata.description,
            tags: metadata.tags,
            category_id: ctx.settings.publish.category_id.clone(),
            privacy: ctx.settings.publish.privacy,
        };
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&request, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.success(&format!(
                    "Published via '{}': {}",
                    success.provider_id, success.value.url
                ));
                state.publish = Some(success.value);
                Ok(())
            }
            Err(error) => {
                record_attempts(state, self.marker(), error.attempts());
                Err(error.into())
            }
        }
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        let publish = state
            .publish
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("publish result not recorded"))?;
        if publish.remote_video_id.is_empty() {
            return Err(StageError::invalid_output("publish result has no video id"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::models::{CompositeVideo, Privacy, Topic, TopicSource};
    use crate::state::ScriptOutput;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn harness_with_composite() -> (tempfile::TempDir, RunContext, RunState) {
        let dir = tempdir().unwrap();
        let logger = Arc::new(
            RunLogger::new("pub-test", dir.path(), LogConfig::default(), None).unwrap(),
        );
        let ctx = RunContext::new(
            "run-1",
            Settings::default(),
            dir.path().join("work"),
            dir.path().join("out"),
            logger,
        );

        let video_path = dir.path().join("short.mp4");
        std::fs::write(&video_path, b"mp4").unwrap();

        let mut state = RunState::new(
            "run-1",
            Topic::new("volcanoes", "Science", TopicSource::Override),
        );
        state.script = Some(ScriptOutput {
            text: "The volcano erupted.".to_string(),
            provider_id: "llm".to_string(),
        });
        state.composite = Some(CompositeVideo {
            video_path,
            thumbnail_path: None,
            duration_seconds: 42.5,
            width: 1080,
            height: 1920,
            captions_embedded: true,
        });
        (dir, ctx, state)
    }

    fn empty_chain() -> FallbackChain<PublishRequest, PublishResult> {
        FallbackChain::new("publish", |_: &PublishResult| Ok(()))
    }

    #[test]
    fn existing_publish_result_blocks_re_execution() {
        let (_dir, ctx, mut state) = harness_with_composite();
        state.publish = Some(PublishResult {
            remote_video_id: "abc".to_string(),
            url: "https://youtube.com/watch?v=abc".to_string(),
            privacy: Privacy::Public,
            uploaded_at: "2025-01-01T00:00:00+00:00".to_string(),
        });

        let stage = PublishStage::new(empty_chain());
        let err = stage.validate_input(&ctx, &state).unwrap_err();
        assert!(matches!(err, StageError::InvalidInput(_)));
    }

    #[test]
    fn missing_composite_is_fatal() {
        let (_dir, ctx, mut state) = harness_with_composite();
        state.composite = None;

        let stage = PublishStage::new(empty_chain());
        let err = stage.validate_input(&ctx, &state).unwrap_err();
        assert!(err.is_fatal());
    }
}
