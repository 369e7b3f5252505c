//! Scripting stage - generates the narration script text.

use std::time::Instant;

use crate::models::RunStage;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::RunContext;
use crate::providers::{build_script_prompt, ChatPrompt, FallbackChain};
use crate::state::{RunState, ScriptOutput};

/// Generates the script via the script provider chain.
pub struct ScriptStage {
    chain: FallbackChain<ChatPrompt, String>,
}

impl ScriptStage {
    pub fn new(chain: FallbackChain<ChatPrompt, String>) -> Self {
        Self { chain }
    }
}

impl Stage for ScriptStage {
    fn name(&self) -> &str {
        "Script"
    }

    fn marker(&self) -> RunStage {
        RunStage::Scripting
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if state.topic.text.trim().is_empty() {
            return Err(StageError::dependency_missing("no topic to script"));
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        deadline: Instant,
    ) -> StageResult<()> {
        let prompt = build_script_prompt(&state.topic);
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&prompt, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.info(&format!(
                    "Script generated by '{}' ({} chars)",
                    success.provider_id,
                    success.value.chars().count()
                ));
                state.script = Some(ScriptOutput {
                    text: success.value,
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
        let script = state
            .script
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("script not recorded"))?;
        if script.text.trim().is_empty() {
            return Err(StageError::invalid_output("recorded script is empty"));
        }
        Ok(())
    }
}
