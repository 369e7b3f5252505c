//! Visual sourcing stage (recoverable).
//!
//! Clip count is bounded by the estimated script duration over the
//! per-clip display time. Degraded default: no downloaded media - the
//! compositor substitutes a generated solid-color background.

use std::time::Instant;

use crate::models::{estimate_spoken_seconds, RunStage, VisualAsset};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::{RunContext, StageKind};
use crate::providers::{FallbackChain, VisualRequest};
use crate::state::{RunState, VisualsOutput};

/// Sources visual media matched to the extracted keywords.
pub struct VisualStage {
    chain: FallbackChain<VisualRequest, Vec<VisualAsset>>,
}

impl VisualStage {
    pub fn new(chain: FallbackChain<VisualRequest, Vec<VisualAsset>>) -> Self {
        Self { chain }
    }

    /// Number of clips for this run's script.
    fn clip_count(ctx: &RunContext, script_text: &str) -> usize {
        let estimated =
            estimate_spoken_seconds(script_text, ctx.settings.run.words_per_minute);
        let per_clip = ctx.settings.video.per_clip_secs.max(0.5);
        let wanted = (estimated / per_clip).ceil() as usize;
        wanted.clamp(1, ctx.settings.video.max_clips)
    }
}

impl Stage for VisualStage {
    fn name(&self) -> &str {
        "Visuals"
    }

    fn marker(&self) -> RunStage {
        RunStage::SourcingMedia
    }

    fn kind(&self) -> StageKind {
        StageKind::Recoverable
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if !state.has_script() {
            return Err(StageError::dependency_missing(
                "visual sourcing requires a script",
            ));
        }
        if state.keywords.is_none() {
            return Err(StageError::dependency_missing(
                "visual sourcing requires keywords",
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        deadline: Instant,
    ) -> StageResult<()> {
        let script_text = match state.script {
            Some(ref script) => script.text.clone(),
            None => return Err(StageError::dependency_missing("script disappeared")),
        };
        let keywords = match state.keywords {
            Some(ref keywords) => keywords.keywords.clone(),
            None => return Err(StageError::dependency_missing("keywords disappeared")),
        };

        let count = Self::clip_count(ctx, &script_text);
        ctx.logger.info(&format!(
            "Sourcing {} clips for {} keywords",
            count,
            keywords.len()
        ));

        let request = VisualRequest {
            keywords,
            count,
            dest_dir: ctx.work_dir.join("media"),
        };
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&request, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.info(&format!(
                    "{} visuals from '{}'",
                    success.value.len(),
                    success.provider_id
                ));
                state.visuals = Some(VisualsOutput {
                    assets: success.value,
                    degraded: false,
                });
                Ok(())
            }
            Err(error) => {
                record_attempts(state, self.marker(), error.attempts());
                Err(error.into())
            }
        }
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        let visuals = state
            .visuals
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("visuals not recorded"))?;

        if visuals.degraded {
            // Degraded runs carry no media; the compositor generates the
            // background itself.
            return Ok(());
        }

        if visuals.assets.is_empty() {
            return Err(StageError::invalid_output("no visual assets recorded"));
        }
        for asset in &visuals.assets {
            if !asset.media_path.exists() {
                return Err(StageError::invalid_output(format!(
                    "media file missing: {}",
                    asset.media_path.display()
                )));
            }
        }
        Ok(())
    }

    fn apply_degraded(&self, ctx: &RunContext, state: &mut RunState) -> Option<StageResult<()>> {
        ctx.logger
            .info("No media sourced; compositor will use a generated background");
        state.visuals = Some(VisualsOutput {
            assets: Vec::new(),
            degraded: true,
        });
        Some(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::models::{Topic, TopicSource};
    use crate::state::ScriptOutput;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn harness() -> (tempfile::TempDir, RunContext, RunState) {
        let dir = tempdir().unwrap();
        let logger = Arc::new(
            RunLogger::new("vis-test", dir.path(), LogConfig::default(), None).unwrap(),
        );
        let ctx = RunContext::new(
            "run-1",
            Settings::default(),
            dir.path().join("work"),
            dir.path().join("out"),
            logger,
        );
        let mut state = RunState::new(
            "run-1",
            Topic::new("volcanoes", "Science", TopicSource::Override),
        );
        state.script = Some(ScriptOutput {
            text: vec!["word"; 100].join(" "),
            provider_id: "llm".to_string(),
        });
        (dir, ctx, state)
    }

    fn empty_chain() -> FallbackChain<VisualRequest, Vec<VisualAsset>> {
        FallbackChain::new("visuals", |_: &Vec<VisualAsset>| Ok(()))
    }

    #[test]
    fn clip_count_derives_from_script_duration() {
        let (_dir, ctx, state) = harness();
        // 100 words at 150 wpm = 40s; 4s per clip = 10 clips
        let script = state.script.as_ref().unwrap();
        assert_eq!(VisualStage::clip_count(&ctx, &script.text), 10);
    }

    #[test]
    fn clip_count_is_capped() {
        let (_dir, ctx, _state) = harness();
        let long_script = vec!["word"; 2000].join(" ");
        assert_eq!(
            VisualStage::clip_count(&ctx, &long_script),
            ctx.settings.video.max_clips
        );
    }

    #[test]
    fn clip_count_has_floor_of_one() {
        let (_dir, ctx, _state) = harness();
        assert_eq!(VisualStage::clip_count(&ctx, "two words"), 1);
    }

    #[test]
    fn degraded_output_passes_validation() {
        let (_dir, ctx, mut state) = harness();
        let stage = VisualStage::new(empty_chain());

        stage.apply_degraded(&ctx, &mut state).unwrap().unwrap();
        stage.validate_output(&ctx, &state).unwrap();

        let visuals = state.visuals.unwrap();
        assert!(visuals.degraded);
        assert!(visuals.assets.is_empty());
    }

    #[test]
    fn non_degraded_output_requires_files_on_disk() {
        let (_dir, ctx, mut state) = harness();
        let stage = VisualStage::new(empty_chain());

        state.visuals = Some(VisualsOutput {
            assets: vec![VisualAsset {
                media_path: ctx.work_dir.join("media/absent.jpg"),
                provider_id: "pexels".to_string(),
                matched_keyword: "volcano".to_string(),
            }],
            degraded: false,
        });

        let err = stage.validate_output(&ctx, &state).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(_)));
    }
}
