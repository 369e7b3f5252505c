//! Run state persistence with single-writer discipline.
//!
//! One JSON file per run id. The initial save uses create-new semantics so
//! that two orchestrators racing on the same run id cannot both claim it.
//! Every save is atomic (temp file + rename + fsync) and verified by
//! re-reading; an unverifiable state is fatal for the run.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::RunStage;

use super::run_state::RunState;

/// Errors from run state persistence.
#[derive(Error, Debug)]
pub enum StateError {
    /// Filesystem failure during a state operation.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// State could not be serialized or parsed.
    #[error("Failed to encode/decode run state: {0}")]
    Serde(#[from] serde_json::Error),

    /// A saved state did not read back as written.
    #[error("Run state at {path} failed verification after save")]
    VerifyFailed { path: PathBuf },

    /// A state file already exists for this run id.
    #[error("Run '{run_id}' already has a state record (stage: {stage})")]
    DuplicateRun { run_id: String, stage: RunStage },

    /// An attempt to move the stage marker backwards.
    #[error("Stage cannot move from {from} to {to}")]
    StageRegression { from: RunStage, to: RunStage },
}

impl StateError {
    /// Create an I/O error with operation context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Filesystem-backed store for run state records.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    /// Directory holding one `<run_id>.json` per run.
    state_dir: PathBuf,
}

impl RunStateStore {
    /// Create a store rooted at the given directory.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Path of the state file for a run id.
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", run_id))
    }

    /// Load the state for a run id, if one exists.
    pub fn load(&self, run_id: &str) -> StateResult<Option<RunState>> {
        let path = self.path_for(run_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| StateError::io("reading run state", e))?;
        let state: RunState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    /// Claim a run id by creating its initial state record.
    ///
    /// Uses create-new file semantics: if a record already exists (whatever
    /// its stage), another owner holds this run id and the claim fails with
    /// `DuplicateRun`.
    pub fn create(&self, state: &RunState) -> StateResult<()> {
        fs::create_dir_all(&self.state_dir)
            .map_err(|e| StateError::io("creating state directory", e))?;

        let path = self.path_for(&state.run_id);
        let json = serde_json::to_string_pretty(state)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Report the stage of the existing record if it is readable.
                let stage = self
                    .load(&state.run_id)
                    .ok()
                    .flatten()
                    .map(|s| s.stage)
                    .unwrap_or(RunStage::SelectingTopic);
                return Err(StateError::DuplicateRun {
                    run_id: state.run_id.clone(),
                    stage,
                });
            }
            Err(e) => return Err(StateError::io("claiming run state", e)),
        };

        file.write_all(json.as_bytes())
            .map_err(|e| StateError::io("writing run state", e))?;
        file.sync_all()
            .map_err(|e| StateError::io("syncing run state", e))?;

        self.verify(&path, state)
    }

    /// Save the state atomically and verify the written record.
    pub fn save(&self, state: &RunState) -> StateResult<()> {
        fs::create_dir_all(&self.state_dir)
            .map_err(|e| StateError::io("creating state directory", e))?;

        let path = self.path_for(&state.run_id);
        let json = serde_json::to_string_pretty(state)?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)
                .map_err(|e| StateError::io("creating temp state file", e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| StateError::io("writing run state", e))?;
            file.sync_all()
                .map_err(|e| StateError::io("syncing run state", e))?;
        }

        fs::rename(&temp_path, &path).map_err(|e| StateError::io("renaming run state", e))?;

        self.verify(&path, state)
    }

    /// Re-read a saved record and check it parses to the same run/stage.
    fn verify(&self, path: &Path, expected: &RunState) -> StateResult<()> {
        let content =
            fs::read_to_string(path).map_err(|e| StateError::io("verifying run state", e))?;
        let parsed: RunState = serde_json::from_str(&content).map_err(|_| {
            StateError::VerifyFailed {
                path: path.to_path_buf(),
            }
        })?;

        if parsed.run_id != expected.run_id || parsed.stage != expected.stage {
            return Err(StateError::VerifyFailed {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}
