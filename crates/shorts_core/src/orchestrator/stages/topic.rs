//! Topic stage - formalizes the trigger-supplied topic as the first
//! pipeline transition.

use std::time::Instant;

use crate::models::RunStage;
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::Stage;
use crate::orchestrator::types::RunContext;
use crate::state::RunState;

/// Records the selected topic.
///
/// The topic itself is resolved by the trigger (schedule, trending feed,
/// or override) before the run starts; this stage validates it and marks
/// the selection complete.
pub struct TopicStage;

impl TopicStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TopicStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for TopicStage {
    fn name(&self) -> &str {
        "Topic"
    }

    fn marker(&self) -> RunStage {
        RunStage::SelectingTopic
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if state.topic.text.trim().is_empty() {
            return Err(StageError::dependency_missing("run has no topic text"));
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        _deadline: Instant,
    ) -> StageResult<()> {
        ctx.logger.info(&format!(
            "Topic: '{}' ({}, {:?})",
            state.topic.text, state.topic.category, state.topic.source
        ));
        Ok(())
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if state.topic.text.trim().is_empty() {
            return Err(StageError::invalid_output("topic text is empty"));
        }
        Ok(())
    }
}
