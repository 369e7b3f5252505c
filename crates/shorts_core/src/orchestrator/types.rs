//! Core types for the pipeline orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::logging::RunLogger;
use crate::providers::ProviderCtx;

/// Read-only context passed to pipeline stages.
///
/// Contains run configuration and shared resources that stages can read
/// but not modify. Mutable progress goes in `RunState`.
pub struct RunContext {
    /// Run identifier.
    pub run_id: String,
    /// Application settings.
    pub settings: Settings,
    /// Run-scoped working directory for artifacts.
    pub work_dir: PathBuf,
    /// Output directory for the final video copy.
    pub output_dir: PathBuf,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
}

impl RunContext {
    /// Create a new context for a run.
    pub fn new(
        run_id: impl Into<String>,
        settings: Settings,
        work_dir: PathBuf,
        output_dir: PathBuf,
        logger: Arc<RunLogger>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            settings,
            work_dir,
            output_dir,
            logger,
        }
    }

    /// Build a provider context for an attempt deadline.
    pub fn provider_ctx(&self, deadline: Instant) -> ProviderCtx<'_> {
        ProviderCtx::new(deadline, &self.work_dir, self.logger.as_ref())
    }
}

/// How the orchestrator treats a stage's terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Failure fails the run.
    Required,
    /// Failure substitutes the stage's degraded default and continues.
    Recoverable,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunReport {
    /// Stages that completed normally.
    pub stages_completed: Vec<String>,
    /// Stages that fell back to their degraded default.
    pub stages_degraded: Vec<String>,
}

impl PipelineRunReport {
    /// Whether every stage completed without degradation.
    pub fn fully_clean(&self) -> bool {
        self.stages_degraded.is_empty()
    }

    /// Total stages that ran.
    pub fn total_stages(&self) -> usize {
        self.stages_completed.len() + self.stages_degraded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tracks_degradation() {
        let report = PipelineRunReport {
            stages_completed: vec!["Script".to_string(), "Narration".to_string()],
            stages_degraded: vec!["Visuals".to_string()],
        };
        assert!(!report.fully_clean());
        assert_eq!(report.total_stages(), 3);
    }
}
