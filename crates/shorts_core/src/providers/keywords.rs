//! Keyword extraction from script text.
//!
//! Two implementations: an LLM-backed extractor (higher quality) and a
//! local frequency-ranking heuristic that is always available.

use super::script::ChatCompletionProvider;
use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request for keyword extraction.
#[derive(Debug, Clone)]
pub struct KeywordRequest {
    /// Script text to extract keywords from.
    pub script_text: String,
    /// Maximum number of keywords to return.
    pub max_keywords: usize,
}

/// LLM-backed keyword extractor.
///
/// Wraps a chat-completion endpoint and parses its comma-separated reply.
pub struct LlmKeywordProvider {
    inner: ChatCompletionProvider,
}

impl LlmKeywordProvider {
    pub fn new(inner: ChatCompletionProvider) -> Self {
        Self { inner }
    }

    fn build_prompt(request: &KeywordRequest) -> String {
        format!(
            "Extract up to {} short visual search keywords from the following narration \
             script. Prefer concrete nouns that an image search would match well.\n\
             Reply with a comma-separated list only, no numbering.\n\n{}",
            request.max_keywords, request.script_text
        )
    }

    /// Parse a comma-separated reply into unique, ordered keywords.
    fn parse_reply(reply: &str, max: usize) -> Vec<String> {
        let mut keywords = Vec::new();
        for part in reply.split(',') {
            let keyword = part
                .trim()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
            if keywords.len() >= max {
                break;
            }
        }
        keywords
    }
}

impl CapabilityProvider<KeywordRequest, Vec<String>> for LlmKeywordProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn invoke(&self, request: &KeywordRequest, ctx: &ProviderCtx) -> ProviderResult<Vec<String>> {
        let prompt = Self::build_prompt(request);
        let reply = self.inner.complete(&prompt, ctx)?;
        let keywords = Self::parse_reply(&reply, request.max_keywords);
        if keywords.is_empty() {
            return Err(ProviderError::invalid_output("no keywords in reply"));
        }
        Ok(keywords)
    }
}

/// Common English words excluded from heuristic keyword ranking.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "always", "been", "before", "being", "below", "between",
    "both", "could", "does", "doing", "down", "during", "each", "every", "from", "further",
    "have", "having", "here", "into", "just", "know", "like", "made", "make", "many", "more",
    "most", "much", "never", "only", "other", "over", "same", "some", "something", "still",
    "such", "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "time", "under", "until", "very", "want", "were", "what", "when", "where",
    "which", "while", "will", "with", "would", "your",
];

/// Frequency-ranking keyword extractor.
///
/// Deterministic and dependency-free: ranks non-stopword words by
/// occurrence count, ties broken by first appearance.
pub struct HeuristicKeywordProvider {
    id: String,
}

impl HeuristicKeywordProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Extract ranked keywords from text.
    pub fn extract(text: &str, max: usize) -> Vec<String> {
        // (word, count, first position), in first-appearance order
        let mut ranked: Vec<(String, usize, usize)> = Vec::new();

        for (position, raw) in text.split_whitespace().enumerate() {
            let word: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();

            if word.len() <= 3
                || word.chars().all(|c| c.is_numeric())
                || STOPWORDS.contains(&word.as_str())
            {
                continue;
            }

            if let Some(entry) = ranked.iter_mut().find(|(w, _, _)| *w == word) {
                entry.1 += 1;
            } else {
                ranked.push((word, 1, position));
            }
        }

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.into_iter().take(max).map(|(w, _, _)| w).collect()
    }
}

impl CapabilityProvider<KeywordRequest, Vec<String>> for HeuristicKeywordProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, request: &KeywordRequest, _ctx: &ProviderCtx) -> ProviderResult<Vec<String>> {
        let keywords = Self::extract(&request.script_text, request.max_keywords);
        if keywords.is_empty() {
            return Err(ProviderError::invalid_output(
                "script has no rankable words",
            ));
        }
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_dedupes_and_limits() {
        let reply = "Volcano, lava flow, VOLCANO, ash cloud, crater, magma";
        let keywords = LlmKeywordProvider::parse_reply(reply, 4);
        assert_eq!(keywords, vec!["volcano", "lava flow", "ash cloud", "crater"]);
    }

    #[test]
    fn parse_reply_strips_decorations() {
        let keywords = LlmKeywordProvider::parse_reply("\"volcano\", (lava), ash.", 5);
        assert_eq!(keywords, vec!["volcano", "lava", "ash"]);
    }

    #[test]
    fn heuristic_ranks_by_frequency_then_position() {
        let text = "The volcano erupted. Lava poured from the volcano while ash covered \
                    the village. Lava glowed red.";
        let keywords = HeuristicKeywordProvider::extract(text, 3);
        // volcano=2, lava=2 (volcano appears first), ash/village/etc = 1
        assert_eq!(keywords[0], "volcano");
        assert_eq!(keywords[1], "lava");
        assert_eq!(keywords.len(), 3);
    }

    #[test]
    fn heuristic_filters_stopwords_and_short_words() {
        let keywords = HeuristicKeywordProvider::extract("it is what it is about that", 10);
        assert!(keywords.is_empty());
    }

    #[test]
    fn heuristic_is_deterministic() {
        let text = "glacier glacier mountain mountain river";
        assert_eq!(
            HeuristicKeywordProvider::extract(text, 5),
            HeuristicKeywordProvider::extract(text, 5)
        );
    }
}
