//! Data model for pipeline runs, artifacts, and publish results.

mod enums;
mod media;
mod script;
mod topic;

pub use enums::{Privacy, RunStage, TopicSource};
pub use media::{CompositeVideo, NarrationAsset, PublishResult, VisualAsset};
pub use script::{estimate_spoken_seconds, topic_words};
pub use topic::Topic;
