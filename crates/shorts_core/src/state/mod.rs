//! Durable per-run state: the record of progress, artifacts, and errors.
//!
//! The run state is the source of truth for idempotency: an existing state
//! file for a run id means that run is owned (in flight) or finished, and a
//! second orchestrator must refuse to start it.

mod run_state;
mod store;

pub use run_state::{ErrorRecord, KeywordsOutput, RunState, ScriptOutput, VisualsOutput};
pub use store::{RunStateStore, StateError, StateResult};
