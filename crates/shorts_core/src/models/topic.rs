//! Topic selected for a run.

use serde::{Deserialize, Serialize};

use super::enums::TopicSource;

/// The subject of one run's video.
///
/// Immutable once recorded in the run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic text, e.g. "A ghost town in California no one visits".
    pub text: String,
    /// Category label, e.g. "Hidden or Abandoned Places".
    pub category: String,
    /// How the topic was chosen.
    pub source: TopicSource,
}

impl Topic {
    /// Create a topic with the given source.
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        source: TopicSource,
    ) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            source,
        }
    }

    /// Create a topic supplied by the trigger.
    pub fn override_topic(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self::new(text, category, TopicSource::Override)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_topic_records_source() {
        let topic = Topic::override_topic("volcanoes", "Science");
        assert_eq!(topic.source, TopicSource::Override);
        assert_eq!(topic.text, "volcanoes");
    }
}
