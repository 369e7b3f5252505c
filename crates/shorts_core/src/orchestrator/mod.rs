//! Pipeline orchestrator for the daily short-video run.
//!
//! This module provides the infrastructure for running the production
//! pipeline. A run is a sequence of stages that validate, execute, and
//! record their artifacts under wall-clock budgets.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Stage: Topic       (required)
//!     ├── Stage: Script      (required)
//!     ├── Stage: Keywords    (recoverable - topic words)
//!     ├── Stage: Visuals     (recoverable - generated background)
//!     ├── Stage: Narration   (required)
//!     ├── Stage: Composite   (required)
//!     └── Stage: Publish     (required)
//! ```
//!
//! Each stage applies a fallback chain of capability providers; the
//! orchestrator classifies stage failures, persists every state
//! transition, and guarantees at-most-once publishing per run id.

mod errors;
mod pipeline;
mod stage;
pub mod stages;
mod types;

pub use errors::{PipelineError, PipelineResult, StageError, StageResult};
pub use pipeline::Pipeline;
pub use stage::Stage;
pub use stages::{
    CompositeStage, KeywordStage, NarrationStage, PublishStage, ScriptStage, TopicStage,
    VisualStage,
};
pub use types::{PipelineRunReport, RunContext, StageKind};

use crate::providers::ProviderRegistry;

/// Create the standard pipeline with all stages in dependency order.
///
/// Consumes the registry: each stage owns its capability chain.
pub fn create_standard_pipeline(registry: ProviderRegistry) -> Pipeline {
    Pipeline::new()
        .with_stage(TopicStage::new())
        .with_stage(ScriptStage::new(registry.script))
        .with_stage(KeywordStage::new(registry.keywords))
        .with_stage(VisualStage::new(registry.visuals))
        .with_stage(NarrationStage::new(registry.narration))
        .with_stage(CompositeStage::new(registry.render))
        .with_stage(PublishStage::new(registry.publish))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn standard_pipeline_has_all_stages_in_order() {
        let mut settings = Settings::default();
        for slot in settings
            .providers
            .script
            .iter_mut()
            .chain(settings.providers.keywords.iter_mut())
            .chain(settings.providers.narration.iter_mut())
            .chain(settings.providers.visuals.iter_mut())
            .chain(settings.providers.publish.iter_mut())
        {
            slot.api_key_env = String::new();
        }

        let registry = ProviderRegistry::build(&settings).unwrap();
        let pipeline = create_standard_pipeline(registry);

        assert_eq!(pipeline.stage_count(), 7);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "Topic",
                "Script",
                "Keywords",
                "Visuals",
                "Narration",
                "Composite",
                "Publish"
            ]
        );
    }
}
