//! Pipeline runner: the single entry point for one production run.
//!
//! Owns the run lifecycle around the pipeline itself: duplicate-run
//! refusal, state claiming, working directories, per-run logging,
//! provider registration, and the failure path (one notification per
//! terminal failure).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::logging::{LogCallback, RunLogger};
use crate::models::{PublishResult, Topic};
use crate::notify::{FailureSummary, Notifier};
use crate::orchestrator::{
    create_standard_pipeline, PipelineError, PipelineRunReport, RunContext, StageError,
};
use crate::providers::ProviderRegistry;
use crate::state::{ErrorRecord, RunState, RunStateStore, StateError};

/// Terminal outcome of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Run published successfully.
    Done {
        publish: PublishResult,
        report: PipelineRunReport,
    },
    /// Run failed terminally; the state record and artifacts are retained.
    Failed {
        failed_stage: String,
        errors: Vec<ErrorRecord>,
    },
}

impl RunOutcome {
    /// Whether the run published.
    pub fn is_done(&self) -> bool {
        matches!(self, RunOutcome::Done { .. })
    }
}

/// Default run id for a date: one logical run per day.
pub fn default_run_id(date: chrono::NaiveDate) -> String {
    format!("short-{}", date.format("%Y%m%d"))
}

/// Runs the production pipeline for one topic.
pub struct PipelineRunner {
    settings: Settings,
    state_dir: PathBuf,
    work_root: PathBuf,
    output_dir: PathBuf,
    logs_dir: PathBuf,
}

impl PipelineRunner {
    /// Create a runner using the directories from settings.
    pub fn new(settings: Settings) -> Self {
        let state_dir = PathBuf::from(&settings.paths.state_folder);
        let work_root = PathBuf::from(&settings.paths.work_root);
        let output_dir = PathBuf::from(&settings.paths.output_folder);
        let logs_dir = PathBuf::from(&settings.paths.logs_folder);
        Self {
            settings,
            state_dir,
            work_root,
            output_dir,
            logs_dir,
        }
    }

    /// Execute one run to a terminal outcome.
    ///
    /// Returns `Ok(RunOutcome)` for both published and failed runs (a
    /// failed run is a valid terminal outcome with a retained record).
    /// Hard refusals - duplicate run id, setup failure, unverifiable
    /// state - are returned as errors; no stage executes and nothing is
    /// notified for a duplicate.
    pub fn run(
        &self,
        run_id: &str,
        topic: Topic,
        notifier: Option<&dyn Notifier>,
        log_callback: Option<LogCallback>,
    ) -> Result<RunOutcome, PipelineError> {
        let store = RunStateStore::new(&self.state_dir);

        // Refuse before any provider is even registered: an existing
        // record (terminal or in-flight) means this run id is owned.
        if let Some(existing) = store
            .load(run_id)
            .map_err(|e| PipelineError::persistence(run_id, e))?
        {
            return Err(PipelineError::DuplicateRun {
                run_id: run_id.to_string(),
                stage: existing.stage,
            });
        }

        let mut state = RunState::new(run_id, topic);
        match store.create(&state) {
            Ok(()) => {}
            Err(StateError::DuplicateRun { run_id, stage }) => {
                // Lost a race with a concurrent orchestrator.
                return Err(PipelineError::DuplicateRun { run_id, stage });
            }
            Err(e) => return Err(PipelineError::persistence(run_id, e)),
        }

        let work_dir = self.work_root.join(run_id);
        fs::create_dir_all(&work_dir).map_err(|e| {
            PipelineError::setup_failed(run_id, format!("creating work directory: {}", e))
        })?;

        let logger = RunLogger::new(
            run_id,
            &self.logs_dir,
            self.settings.logging.to_log_config(),
            log_callback,
        )
        .map_err(|e| PipelineError::setup_failed(run_id, format!("creating logger: {}", e)))?;
        let logger = Arc::new(logger);

        let registry = ProviderRegistry::build(&self.settings)
            .map_err(|e| PipelineError::setup_failed(run_id, e.to_string()))?;
        let pipeline = create_standard_pipeline(registry);

        let ctx = RunContext::new(
            run_id,
            self.settings.clone(),
            work_dir,
            self.output_dir.clone(),
            logger.clone(),
        );

        logger.info(&format!(
            "Starting run '{}' for topic '{}'",
            run_id, state.topic.text
        ));
        tracing::info!(run_id = %run_id, topic = %state.topic.text, "starting pipeline run");

        match pipeline.run(&ctx, &mut state, &store) {
            Ok(report) => {
                let publish = state.publish.clone().ok_or_else(|| {
                    PipelineError::stage_failed(
                        run_id,
                        "Publish",
                        StageError::invalid_output("publish result missing after success"),
                    )
                })?;
                logger.success(&format!("Run complete: {}", publish.url));
                tracing::info!(run_id = %run_id, url = %publish.url, "pipeline run published");
                Ok(RunOutcome::Done { publish, report })
            }
            Err(error @ (PipelineError::StageFailed { .. }
            | PipelineError::RunBudgetExceeded { .. })) => {
                logger.error(&format!("Run failed: {}", error));
                tracing::warn!(run_id = %run_id, error = %error, "pipeline run failed");

                let summary = FailureSummary::from_state(&state, self.settings.notify.max_errors);
                self.notify_once(notifier, &summary, &logger);

                Ok(RunOutcome::Failed {
                    failed_stage: summary.failed_stage,
                    errors: summary.errors,
                })
            }
            // Persistence failures (and other hard conditions) abort
            // without recovery or notification: the state record cannot
            // be trusted.
            Err(error) => Err(error),
        }
    }

    /// The single notification point for a terminal failure.
    fn notify_once(
        &self,
        notifier: Option<&dyn Notifier>,
        summary: &FailureSummary,
        logger: &RunLogger,
    ) {
        let Some(notifier) = notifier else {
            return;
        };
        match notifier.notify(summary) {
            Ok(()) => logger.info("Failure notification delivered"),
            Err(e) => {
                logger.warn(&format!("failure notification not delivered: {}", e));
                tracing::warn!(run_id = %summary.run_id, error = %e, "notification delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunStage, TopicSource};
    use crate::notify::NotifyError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingNotifier {
        calls: AtomicUsize,
        last_stage: Mutex<Option<String>>,
    }

    impl CountingNotifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_stage: Mutex::new(None),
            }
        }
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, summary: &FailureSummary) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_stage.lock() = Some(summary.failed_stage.clone());
            Ok(())
        }
    }

    /// Settings whose providers all point at an unroutable local port,
    /// so the script stage fails fast without external traffic.
    fn offline_settings(root: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.paths.state_folder = root.join("state").to_string_lossy().to_string();
        settings.paths.work_root = root.join("work").to_string_lossy().to_string();
        settings.paths.output_folder = root.join("out").to_string_lossy().to_string();
        settings.paths.logs_folder = root.join("logs").to_string_lossy().to_string();
        settings.run.script_budget_secs = 5;

        for chain in [
            &mut settings.providers.script,
            &mut settings.providers.keywords,
            &mut settings.providers.narration,
            &mut settings.providers.visuals,
            &mut settings.providers.publish,
        ] {
            for slot in chain.iter_mut() {
                slot.api_key_env = String::new();
                slot.base_url = "http://127.0.0.1:9".to_string();
                slot.timeout_secs = 1;
                slot.retries = 0;
            }
        }
        settings
    }

    fn topic() -> Topic {
        Topic::new("volcanoes", "Science", TopicSource::Override)
    }

    #[test]
    fn failed_required_stage_yields_failed_outcome_and_one_notification() {
        let dir = tempdir().unwrap();
        let runner = PipelineRunner::new(offline_settings(dir.path()));
        let notifier = CountingNotifier::new();

        let outcome = runner
            .run("short-20250101", topic(), Some(&notifier), None)
            .unwrap();

        match outcome {
            RunOutcome::Failed {
                failed_stage,
                errors,
            } => {
                assert_eq!(failed_stage, "scripting");
                assert!(!errors.is_empty());
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        // Terminal state retained, no publish result
        let store = RunStateStore::new(dir.path().join("state"));
        let state = store.load("short-20250101").unwrap().unwrap();
        assert_eq!(state.stage, RunStage::Failed);
        assert!(state.publish.is_none());
    }

    #[test]
    fn second_invocation_for_same_run_id_is_refused_without_notification() {
        let dir = tempdir().unwrap();
        let runner = PipelineRunner::new(offline_settings(dir.path()));
        let notifier = CountingNotifier::new();

        let _ = runner
            .run("short-20250101", topic(), Some(&notifier), None)
            .unwrap();
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        let err = runner
            .run("short-20250101", topic(), Some(&notifier), None)
            .unwrap_err();

        assert!(matches!(err, PipelineError::DuplicateRun { .. }));
        // No second notification for the refusal
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn done_state_short_circuits_with_duplicate_run() {
        let dir = tempdir().unwrap();
        let settings = offline_settings(dir.path());
        let store = RunStateStore::new(&settings.paths.state_folder);

        let mut state = RunState::new("short-20250102", topic());
        state.advance_to(RunStage::Done).unwrap();
        store.create(&state).unwrap();

        let runner = PipelineRunner::new(settings);
        let err = runner
            .run("short-20250102", topic(), None, None)
            .unwrap_err();

        match err {
            PipelineError::DuplicateRun { run_id, stage } => {
                assert_eq!(run_id, "short-20250102");
                assert_eq!(stage, RunStage::Done);
            }
            other => panic!("expected DuplicateRun, got {:?}", other),
        }
    }

    #[test]
    fn default_run_id_is_date_scoped() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(default_run_id(date), "short-20250101");
    }
}
