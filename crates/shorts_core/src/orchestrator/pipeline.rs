//! Pipeline runner that drives stages in dependency order.
//!
//! The pipeline executes stages sequentially under a global run budget
//! and per-stage budgets, persists the run state after every transition,
//! and classifies stage failures as recoverable (substitute the degraded
//! default, continue) or required (fail the run).

use std::cmp;
use std::time::Instant;

use crate::models::RunStage;
use crate::state::{RunState, RunStateStore};

use super::errors::{PipelineError, PipelineResult, StageError};
use super::stage::Stage;
use super::types::{PipelineRunReport, RunContext, StageKind};

/// Pipeline that runs a sequence of stages for one run.
pub struct Pipeline {
    /// Stages to execute in order.
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage (builder pattern).
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Get the number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Get stage names in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline to completion.
    ///
    /// For each stage:
    /// 1. Check the global run budget
    /// 2. Run `validate_input` (missing dependency = fatal)
    /// 3. Run `execute` with a deadline = min(stage budget, run budget)
    /// 4. Run `validate_output`
    /// 5. Persist the forward stage transition
    ///
    /// On a stage failure the run state is transitioned to `Failed` and
    /// persisted before the error is returned; the caller owns the
    /// notification path. The final stage's success transitions to `Done`.
    pub fn run(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        store: &RunStateStore,
    ) -> PipelineResult<PipelineRunReport> {
        let run_deadline = Instant::now() + ctx.settings.run.run_budget();
        let mut report = PipelineRunReport::default();

        for stage in &self.stages {
            let marker = stage.marker();

            // Stages already passed (never the case for a fresh state, but
            // keeps re-entry harmless).
            if state.stage.ordinal() > marker.ordinal() {
                ctx.logger
                    .info(&format!("{} already recorded, skipping", stage.name()));
                continue;
            }

            // Global budget check: on exhaustion, abort remaining stages
            // and go straight to the failure path.
            if Instant::now() >= run_deadline {
                state.record_error(marker, "orchestrator", "run budget exhausted");
                self.fail(ctx, state, store)?;
                return Err(PipelineError::run_budget_exceeded(
                    &ctx.run_id,
                    stage.name(),
                ));
            }

            ctx.logger.stage(stage.name());

            if let Err(error) = stage.validate_input(ctx, state) {
                ctx.logger
                    .error(&format!("{} input validation failed: {}", stage.name(), error));
                state.record_error(marker, "orchestrator", error.to_string());
                self.fail(ctx, state, store)?;
                return Err(PipelineError::stage_failed(&ctx.run_id, stage.name(), error));
            }

            let budget = ctx.settings.run.budget_for(marker);
            let deadline = cmp::min(run_deadline, Instant::now() + budget);

            let result = stage
                .execute(ctx, state, deadline)
                .and_then(|()| stage.validate_output(ctx, state));

            match result {
                Ok(()) => {
                    ctx.logger.success(&format!("{} completed", stage.name()));
                    self.advance(ctx, state, store, marker)?;
                    report.stages_completed.push(stage.name().to_string());
                }
                Err(error) => {
                    ctx.logger
                        .error(&format!("{} failed: {}", stage.name(), error));
                    state.record_error(marker, "orchestrator", error.to_string());

                    if stage.kind() == StageKind::Recoverable && !error.is_fatal() {
                        if let Some(degraded) = self.try_degraded(stage.as_ref(), ctx, state) {
                            match degraded {
                                Ok(()) => {
                                    ctx.logger.warn(&format!(
                                        "{} continuing with degraded default",
                                        stage.name()
                                    ));
                                    self.advance(ctx, state, store, marker)?;
                                    report.stages_degraded.push(stage.name().to_string());
                                    continue;
                                }
                                Err(degraded_error) => {
                                    state.record_error(
                                        marker,
                                        "orchestrator",
                                        degraded_error.to_string(),
                                    );
                                    self.fail(ctx, state, store)?;
                                    return Err(PipelineError::stage_failed(
                                        &ctx.run_id,
                                        stage.name(),
                                        degraded_error,
                                    ));
                                }
                            }
                        }
                    }

                    self.fail(ctx, state, store)?;
                    return Err(PipelineError::stage_failed(&ctx.run_id, stage.name(), error));
                }
            }
        }

        ctx.logger.success("Pipeline completed");
        Ok(report)
    }

    /// Apply a recoverable stage's degraded default, then re-validate.
    fn try_degraded(
        &self,
        stage: &dyn Stage,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Option<Result<(), StageError>> {
        let applied = stage.apply_degraded(ctx, state)?;
        Some(applied.and_then(|()| stage.validate_output(ctx, state)))
    }

    /// Persist a forward transition out of the completed stage.
    fn advance(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        store: &RunStateStore,
        completed: RunStage,
    ) -> PipelineResult<()> {
        let next = completed
            .next()
            .unwrap_or(RunStage::Done);
        state
            .advance_to(next)
            .map_err(|e| PipelineError::persistence(&ctx.run_id, e))?;
        store
            .save(state)
            .map_err(|e| PipelineError::persistence(&ctx.run_id, e))
    }

    /// Transition to `Failed` and persist the terminal record.
    fn fail(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        store: &RunStateStore,
    ) -> PipelineResult<()> {
        if !state.stage.is_terminal() {
            state
                .advance_to(RunStage::Failed)
                .map_err(|e| PipelineError::persistence(&ctx.run_id, e))?;
        }
        store
            .save(state)
            .map_err(|e| PipelineError::persistence(&ctx.run_id, e))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
