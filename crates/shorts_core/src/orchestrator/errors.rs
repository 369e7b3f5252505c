//! Error types for the pipeline orchestrator.
//!
//! Errors carry context that chains through layers:
//! Run → Stage → Provider attempt

use std::io;

use thiserror::Error;

use crate::models::RunStage;
use crate::state::StateError;

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage failed terminally.
    #[error("Run '{run_id}' failed at stage '{stage_name}': {source}")]
    StageFailed {
        run_id: String,
        stage_name: String,
        #[source]
        source: StageError,
    },

    /// A state record already exists for this run id.
    ///
    /// Raised before any stage executes; a second orchestrator must never
    /// re-run (or re-publish) an owned run id.
    #[error("Run '{run_id}' already exists (stage: {stage}); refusing to start")]
    DuplicateRun { run_id: String, stage: RunStage },

    /// The run state could not be persisted or verified.
    #[error("Run '{run_id}' state persistence failed: {source}")]
    Persistence {
        run_id: String,
        #[source]
        source: StateError,
    },

    /// The global run budget was exhausted.
    #[error("Run '{run_id}' exceeded its wall-clock budget before stage '{at_stage}'")]
    RunBudgetExceeded { run_id: String, at_stage: String },

    /// Run setup failed (directories, logger, provider registration).
    #[error("Run '{run_id}' setup failed: {message}")]
    SetupFailed { run_id: String, message: String },
}

impl PipelineError {
    /// Create a stage failed error.
    pub fn stage_failed(
        run_id: impl Into<String>,
        stage_name: impl Into<String>,
        source: StageError,
    ) -> Self {
        Self::StageFailed {
            run_id: run_id.into(),
            stage_name: stage_name.into(),
            source,
        }
    }

    /// Create a persistence error.
    pub fn persistence(run_id: impl Into<String>, source: StateError) -> Self {
        Self::Persistence {
            run_id: run_id.into(),
            source,
        }
    }

    /// Create a run budget exceeded error.
    pub fn run_budget_exceeded(run_id: impl Into<String>, at_stage: impl Into<String>) -> Self {
        Self::RunBudgetExceeded {
            run_id: run_id.into(),
            at_stage: at_stage.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_id: run_id.into(),
            message: message.into(),
        }
    }
}

/// Error from a pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// Every provider in the stage's chain failed.
    #[error("all providers for '{capability}' exhausted after {attempts} failed attempts")]
    ProviderExhausted { capability: String, attempts: usize },

    /// The stage's wall-clock budget ran out.
    #[error("stage budget exhausted while running '{capability}'")]
    BudgetExceeded { capability: String },

    /// A declared upstream artifact is missing. Always fatal.
    #[error("missing upstream dependency: {0}")]
    DependencyMissing(String),

    /// Input validation failed.
    #[error("input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("output validation failed: {0}")]
    InvalidOutput(String),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    /// Create a dependency missing error.
    pub fn dependency_missing(message: impl Into<String>) -> Self {
        Self::DependencyMissing(message.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error must abort the run even in a recoverable stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DependencyMissing(_))
    }
}

impl From<crate::providers::ChainError> for StageError {
    fn from(error: crate::providers::ChainError) -> Self {
        match error {
            crate::providers::ChainError::Exhausted {
                capability,
                attempts,
            } => Self::ProviderExhausted {
                capability,
                attempts: attempts.len(),
            },
            crate::providers::ChainError::DeadlineExceeded { capability, .. } => {
                Self::BudgetExceeded { capability }
            }
        }
    }
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
