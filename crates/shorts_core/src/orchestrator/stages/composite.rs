//! Compositing stage - renders the final video.
//!
//! Combines exactly the narration and visuals recorded in this run's
//! state; the output duration follows the narration plus the configured
//! tail padding.

use std::time::Instant;

use crate::models::{CompositeVideo, RunStage};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::RunContext;
use crate::providers::{FallbackChain, RenderRequest};
use crate::state::RunState;

/// Tolerance when comparing the rendered duration to the narration.
const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// Renders the composite video.
pub struct CompositeStage {
    chain: FallbackChain<RenderRequest, CompositeVideo>,
}

impl CompositeStage {
    pub fn new(chain: FallbackChain<RenderRequest, CompositeVideo>) -> Self {
        Self { chain }
    }
}

impl Stage for CompositeStage {
    fn name(&self) -> &str {
        "Composite"
    }

    fn marker(&self) -> RunStage {
        RunStage::Compositing
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if !state.has_script() {
            return Err(StageError::dependency_missing(
                "compositing requires a script",
            ));
        }
        let narration = state
            .narration
            .as_ref()
            .ok_or_else(|| StageError::dependency_missing("compositing requires narration"))?;
        if !narration.audio_path.exists() {
            return Err(StageError::dependency_missing(format!(
                "narration file missing: {}",
                narration.audio_path.display()
            )));
        }
        if state.visuals.is_none() {
            return Err(StageError::dependency_missing(
                "compositing requires the visual sourcing result",
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
        let (narration_path, narration_seconds) = match state.narration {
            Some(ref narration) => (narration.audio_path.clone(), narration.duration_seconds),
            None => return Err(StageError::dependency_missing("narration disappeared")),
        };
        let script_text = match state.script {
            Some(ref script) => script.text.clone(),
            None => return Err(StageError::dependency_missing("script disappeared")),
        };
        let visuals = state
            .visuals
            .as_ref()
            .map(|v| v.assets.clone())
            .unwrap_or_default();

        std::fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| StageError::io("creating output directory", e))?;

        let request = RenderRequest {
            narration_path,
            narration_seconds,
            visuals,
            script_text,
            output_path: ctx.output_dir.join(format!("{}.mp4", ctx.run_id)),
            thumbnail_path: ctx.work_dir.join("thumbnail.jpg"),
            video: ctx.settings.video.clone(),
        };
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&request, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.info(&format!(
                    "Composite rendered by '{}': {:.1}s at {}",
                    success.provider_id,
                    success.value.duration_seconds,
                    success.value.video_path.display()
                ));
                state.composite = Some(success.value);
                Ok(())
            }
            Err(error) => {
                record_attempts(state, self.marker(), error.attempts());
                Err(error.into())
            }
        }
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        let composite = state
            .composite
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("composite not recorded"))?;

        if !composite.video_path.exists() {
            return Err(StageError::invalid_output(format!(
                "video file missing: {}",
                composite.video_path.display()
            )));
        }

        // The composite must cover the narration it embeds.
        if let Some(ref narration) = state.narration {
            if composite.duration_seconds + DURATION_TOLERANCE_SECS < narration.duration_seconds {
                return Err(StageError::invalid_output(format!(
                    "composite ({:.1}s) shorter than narration ({:.1}s)",
                    composite.duration_seconds, narration.duration_seconds
                )));
            }
        }

        Ok(())
    }
}
