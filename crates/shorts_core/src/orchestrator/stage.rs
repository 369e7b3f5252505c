//! Pipeline stage trait definition.
//!
//! All pipeline stages implement this trait, providing a consistent
//! interface for validation and execution.

use std::time::Instant;

use crate::models::RunStage;
use crate::providers::AttemptError;
use crate::state::RunState;

use super::errors::StageResult;
use super::types::{RunContext, StageKind};

/// Trait for pipeline stages.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - Check upstream artifacts before execution
/// 2. `execute` - Apply the stage's fallback chain and record its artifact
/// 3. `validate_output` - Verify the artifact exists on stable storage
///
/// A recoverable stage additionally implements `apply_degraded`, which the
/// runner invokes when the chain is exhausted.
pub trait Stage: Send + Sync {
    /// Get the stage name (for logging and error context).
    fn name(&self) -> &str;

    /// The stage marker this stage executes under.
    fn marker(&self) -> RunStage;

    /// Failure classification. Defaults to required.
    fn kind(&self) -> StageKind {
        StageKind::Required
    }

    /// Validate upstream artifacts before execution.
    ///
    /// A missing declared dependency is a programming-level fatal error:
    /// return `StageError::DependencyMissing` and the run aborts without
    /// attempting recovery, whatever the stage's kind.
    fn validate_input(&self, ctx: &RunContext, state: &RunState) -> StageResult<()>;

    /// Execute the stage's main work.
    ///
    /// Applies the stage's fallback chain with the given wall-clock
    /// deadline and records the resulting artifact (and any failed
    /// provider attempts) in `state`.
    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        deadline: Instant,
    ) -> StageResult<()>;

    /// Validate the artifact after execution.
    ///
    /// Called after `execute` (and after `apply_degraded`). Must verify
    /// the artifact is present in `state` and exists on stable storage
    /// before the stage transition is persisted.
    fn validate_output(&self, ctx: &RunContext, state: &RunState) -> StageResult<()>;

    /// Substitute the stage's degraded default.
    ///
    /// Recoverable stages return `Some(result)` after writing the degraded
    /// artifact into `state`; required stages return `None` (the default).
    fn apply_degraded(&self, _ctx: &RunContext, _state: &mut RunState) -> Option<StageResult<()>> {
        None
    }
}

/// Record failed provider attempts in the run's error log.
pub(super) fn record_attempts(state: &mut RunState, stage: RunStage, attempts: &[AttemptError]) {
    for attempt in attempts {
        state.record_error(stage, attempt.provider_id.clone(), attempt.error.to_string());
    }
}
