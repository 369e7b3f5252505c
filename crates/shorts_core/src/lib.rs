//! Shorts Core - daily short-video production pipeline
//!
//! This crate contains all pipeline logic with no CLI dependencies:
//! capability providers behind fallback chains, the stage orchestrator,
//! durable run state, and the failure notification path. It is driven by
//! the `shorts_app` binary or any other trigger.

pub mod config;
pub mod logging;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod providers;
pub mod runner;
pub mod schedule;
pub mod state;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
