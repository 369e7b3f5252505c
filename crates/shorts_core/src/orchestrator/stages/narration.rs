//! Narration synthesis stage.

use std::time::Instant;

use crate::models::{NarrationAsset, RunStage};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::RunContext;
use crate::providers::{FallbackChain, NarrationRequest, SynthesizedAudio};
use crate::state::RunState;

/// Synthesizes narration audio from the script.
pub struct NarrationStage {
    chain: FallbackChain<NarrationRequest, SynthesizedAudio>,
}

impl NarrationStage {
    pub fn new(chain: FallbackChain<NarrationRequest, SynthesizedAudio>) -> Self {
        Self { chain }
    }
}

impl Stage for NarrationStage {
    fn name(&self) -> &str {
        "Narration"
    }

    fn marker(&self) -> RunStage {
        RunStage::SynthesizingAudio
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if !state.has_script() {
            return Err(StageError::dependency_missing(
                "narration requires a script",
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

        std::fs::create_dir_all(&ctx.work_dir)
            .map_err(|e| StageError::io("creating work directory", e))?;

        let request = NarrationRequest {
            script_text,
            output_stem: ctx.work_dir.join("narration"),
        };
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&request, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.info(&format!(
                    "Narration by '{}': {:.1}s",
                    success.provider_id, success.value.duration_seconds
                ));
                state.narration = Some(NarrationAsset {
                    audio_path: success.value.path,
                    duration_seconds: success.value.duration_seconds,
                    provider_id: success.provider_id,
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
        let narration = state
            .narration
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("narration not recorded"))?;

        if narration.duration_seconds <= 0.0 {
            return Err(StageError::invalid_output(format!(
                "narration duration is {:.3}s",
                narration.duration_seconds
            )));
        }
        if !narration.audio_path.exists() {
            return Err(StageError::invalid_output(format!(
                "narration file missing: {}",
                narration.audio_path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::models::{Topic, TopicSource};
    use crate::providers::{CapabilityProvider, ProviderCtx, ProviderResult};
    use crate::state::ScriptOutput;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Writes a fake audio file and reports a fixed duration.
    struct FixedAudioProvider {
        id: &'static str,
        duration: f64,
    }

    impl CapabilityProvider<NarrationRequest, SynthesizedAudio> for FixedAudioProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn invoke(
            &self,
            request: &NarrationRequest,
            _ctx: &ProviderCtx,
        ) -> ProviderResult<SynthesizedAudio> {
            let path = request.output_stem.with_extension("wav");
            std::fs::write(&path, b"RIFF").unwrap();
            Ok(SynthesizedAudio {
                path,
                duration_seconds: self.duration,
            })
        }
    }

    /// Provider that always errors.
    struct BrokenProvider;

    impl CapabilityProvider<NarrationRequest, SynthesizedAudio> for BrokenProvider {
        fn id(&self) -> &str {
            "neural-tts"
        }

        fn invoke(
            &self,
            _request: &NarrationRequest,
            _ctx: &ProviderCtx,
        ) -> ProviderResult<SynthesizedAudio> {
            Err(crate::providers::ProviderError::invalid_output(
                "garbled audio",
            ))
        }
    }

    fn harness() -> (tempfile::TempDir, RunContext, RunState) {
        let dir = tempdir().unwrap();
        let logger = Arc::new(
            RunLogger::new("narr-test", dir.path(), LogConfig::default(), None).unwrap(),
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
            text: "The volcano erupted.".to_string(),
            provider_id: "llm".to_string(),
        });
        (dir, ctx, state)
    }

    fn validated_chain() -> FallbackChain<NarrationRequest, SynthesizedAudio> {
        FallbackChain::new("narration", |audio: &SynthesizedAudio| {
            if audio.duration_seconds > 0.0 {
                Ok(())
            } else {
                Err("invalid duration".to_string())
            }
        })
    }

    #[test]
    fn fallback_provider_serves_when_primary_fails() {
        let (_dir, ctx, mut state) = harness();

        let chain = validated_chain()
            .with_provider(
                Box::new(BrokenProvider),
                Duration::from_secs(5),
                0,
                Duration::from_millis(1),
            )
            .with_provider(
                Box::new(FixedAudioProvider {
                    id: "espeak",
                    duration: 42.0,
                }),
                Duration::from_secs(5),
                0,
                Duration::from_millis(1),
            );

        let stage = NarrationStage::new(chain);
        stage
            .execute(&ctx, &mut state, Instant::now() + Duration::from_secs(10))
            .unwrap();
        stage.validate_output(&ctx, &state).unwrap();

        let narration = state.narration.as_ref().unwrap();
        assert_eq!(narration.provider_id, "espeak");
        assert!((narration.duration_seconds - 42.0).abs() < f64::EPSILON);
        // The failed neural attempt is in the error log
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].provider_id, "neural-tts");
    }

    #[test]
    fn exhausted_chain_records_attempts_and_fails() {
        let (_dir, ctx, mut state) = harness();

        let chain = validated_chain().with_provider(
            Box::new(BrokenProvider),
            Duration::from_secs(5),
            0,
            Duration::from_millis(1),
        );

        let stage = NarrationStage::new(chain);
        let err = stage
            .execute(&ctx, &mut state, Instant::now() + Duration::from_secs(10))
            .unwrap_err();

        assert!(matches!(err, StageError::ProviderExhausted { .. }));
        assert!(state.narration.is_none());
        assert_eq!(state.errors.len(), 1);
    }

    #[test]
    fn output_requires_file_on_disk() {
        let (_dir, ctx, mut state) = harness();
        state.narration = Some(NarrationAsset {
            audio_path: PathBuf::from("/nonexistent/narration.mp3"),
            duration_seconds: 10.0,
            provider_id: "espeak".to_string(),
        });

        let stage = NarrationStage::new(validated_chain());
        let err = stage.validate_output(&ctx, &state).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(_)));
    }
}
