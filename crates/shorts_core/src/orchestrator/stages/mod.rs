//! Pipeline stage implementations.
//!
//! Each stage handles one phase of the production pipeline, applying its
//! capability chain and recording the artifact in the run state.

mod composite;
mod keywords;
mod narration;
mod publish;
mod script;
mod topic;
mod visuals;

pub use composite::CompositeStage;
pub use keywords::KeywordStage;
pub use narration::NarrationStage;
pub use publish::PublishStage;
pub use script::ScriptStage;
pub use topic::TopicStage;
pub use visuals::VisualStage;
