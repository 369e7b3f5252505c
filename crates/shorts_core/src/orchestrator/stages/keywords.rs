//! Keyword extraction stage (recoverable).
//!
//! Degraded default: keywords derived from the topic words, so a degraded
//! run still drives a generic visual search.

use std::time::Instant;

use crate::models::{topic_words, RunStage};
use crate::orchestrator::errors::{StageError, StageResult};
use crate::orchestrator::stage::{record_attempts, Stage};
use crate::orchestrator::types::{RunContext, StageKind};
use crate::providers::{FallbackChain, KeywordRequest};
use crate::state::{KeywordsOutput, RunState};

/// Extracts visual search keywords from the script.
pub struct KeywordStage {
    chain: FallbackChain<KeywordRequest, Vec<String>>,
}

impl KeywordStage {
    pub fn new(chain: FallbackChain<KeywordRequest, Vec<String>>) -> Self {
        Self { chain }
    }
}

impl Stage for KeywordStage {
    fn name(&self) -> &str {
        "Keywords"
    }

    fn marker(&self) -> RunStage {
        RunStage::ExtractingKeywords
    }

    fn kind(&self) -> StageKind {
        StageKind::Recoverable
    }

    fn validate_input(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        if !state.has_script() {
            return Err(StageError::dependency_missing(
                "keyword extraction requires a script",
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
        deadline: Instant,
    ) -> StageResult<()> {
        let script_text = match state.script {
            Some(ref script) => script.text.clone(),
            None => return Err(StageError::dependency_missing("script disappeared")),
        };
        let request = KeywordRequest {
            script_text,
            max_keywords: ctx.settings.run.max_keywords,
        };
        let provider_ctx = ctx.provider_ctx(deadline);

        match self.chain.execute(&request, &provider_ctx) {
            Ok(success) => {
                record_attempts(state, self.marker(), &success.attempts);
                ctx.logger.info(&format!(
                    "Keywords from '{}': {}",
                    success.provider_id,
                    success.value.join(", ")
                ));
                state.keywords = Some(KeywordsOutput {
                    keywords: success.value,
                    provider_id: Some(success.provider_id),
                    degraded: false,
                });
                Ok(())
            }
            Err(error) => {
                record_attempts(state, self.marker(), error.attempts());
                Err(error.into())
            }
        }
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StageResult<()> {
        let keywords = state
            .keywords
            .as_ref()
            .ok_or_else(|| StageError::invalid_output("keywords not recorded"))?;
        if keywords.keywords.is_empty() {
            return Err(StageError::invalid_output("keyword list is empty"));
        }
        Ok(())
    }

    fn apply_degraded(&self, ctx: &RunContext, state: &mut RunState) -> Option<StageResult<()>> {
        let mut keywords = topic_words(&state.topic.text);
        if keywords.is_empty() {
            let category: String = state
                .topic
                .category
                .to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                .collect();
            let category = category.trim().to_string();
            if !category.is_empty() {
                keywords.push(category);
            }
        }
        if keywords.is_empty() {
            keywords.push("abstract background".to_string());
        }

        ctx.logger
            .info(&format!("Degraded keywords: {}", keywords.join(", ")));
        state.keywords = Some(KeywordsOutput {
            keywords,
            provider_id: None,
            degraded: true,
        });
        Some(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::models::{Topic, TopicSource};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn harness(topic_text: &str) -> (tempfile::TempDir, RunContext, RunState) {
        let dir = tempdir().unwrap();
        let logger = Arc::new(
            RunLogger::new("kw-test", dir.path(), LogConfig::default(), None).unwrap(),
        );
        let ctx = RunContext::new(
            "run-1",
            Settings::default(),
            dir.path().join("work"),
            dir.path().join("out"),
            logger,
        );
        let state = RunState::new(
            "run-1",
            Topic::new(topic_text, "Science", TopicSource::Override),
        );
        (dir, ctx, state)
    }

    fn empty_chain() -> FallbackChain<KeywordRequest, Vec<String>> {
        FallbackChain::new("keywords", |_: &Vec<String>| Ok(()))
    }

    #[test]
    fn degraded_default_uses_topic_words() {
        let (_dir, ctx, mut state) = harness("ancient pyramid discovery");
        let stage = KeywordStage::new(empty_chain());

        stage.apply_degraded(&ctx, &mut state).unwrap().unwrap();

        let keywords = state.keywords.unwrap();
        assert!(keywords.degraded);
        assert!(keywords.provider_id.is_none());
        assert_eq!(keywords.keywords, vec!["ancient", "pyramid", "discovery"]);
    }

    #[test]
    fn degraded_default_never_empty() {
        let (_dir, ctx, mut state) = harness("a b c");
        let stage = KeywordStage::new(empty_chain());

        stage.apply_degraded(&ctx, &mut state).unwrap().unwrap();
        assert!(!state.keywords.unwrap().keywords.is_empty());
    }

    #[test]
    fn input_requires_script() {
        let (_dir, ctx, state) = harness("topic");
        let stage = KeywordStage::new(empty_chain());
        let err = stage.validate_input(&ctx, &state).unwrap_err();
        assert!(err.is_fatal());
    }
}
