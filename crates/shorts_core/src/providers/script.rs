//! Script generation via chat-completion APIs.
//!
//! One adapter covers every OpenAI-compatible endpoint; the primary and
//! fallback script providers are two configurations of it (different base
//! URL, model, and credential).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Topic;

use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request for one chat completion.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    /// Fully rendered user prompt.
    pub prompt: String,
}

/// Build the script-writing prompt for a topic.
pub fn build_script_prompt(topic: &Topic) -> ChatPrompt {
    let prompt = format!(
        "Write a short, punchy 60-second vertical video script based on the topic: '{}'.\n\
         Start with a strong curiosity hook. Keep the tone mysterious, factual, or nostalgic \
         depending on the topic.\n\
         Focus on one interesting fact or story. End with a call-to-action like:\n\
         \"Did you know this? Comment below.\" or \"Want more hidden facts? Follow for more.\"\n\
         Reply with the narration text only, no headings or stage directions.",
        topic.text
    );
    ChatPrompt { prompt }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completion provider (OpenAI-compatible API).
pub struct ChatCompletionProvider {
    id: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl ChatCompletionProvider {
    /// Create a provider for an OpenAI-compatible endpoint.
    ///
    /// `api_key` is optional: local endpoints are typically keyless.
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Identifier recorded in artifacts and error records.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run one chat completion, returning the assistant text.
    pub fn complete(&self, prompt: &str, ctx: &ProviderCtx) -> ProviderResult<String> {
        let timeout = effective_timeout(ctx);
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut request = self.client.post(&url).timeout(timeout).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ProviderError::invalid_output(format!("unparseable response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::invalid_output("empty completion"));
        }

        Ok(content)
    }
}

impl CapabilityProvider<ChatPrompt, String> for ChatCompletionProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, request: &ChatPrompt, ctx: &ProviderCtx) -> ProviderResult<String> {
        self.complete(&request.prompt, ctx)
    }
}

/// Remaining time before the attempt deadline, floored at one second so
/// the HTTP client always gets a usable timeout.
pub(super) fn effective_timeout(ctx: &ProviderCtx) -> Duration {
    ctx.remaining().max(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicSource;

    #[test]
    fn prompt_embeds_topic() {
        let topic = Topic::new("volcanoes", "Science", TopicSource::Override);
        let prompt = build_script_prompt(&topic);
        assert!(prompt.prompt.contains("'volcanoes'"));
        assert!(prompt.prompt.contains("curiosity hook"));
    }

    #[test]
    fn chat_request_serializes_openai_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"model\":\"gpt-4o-mini\""));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn chat_response_parses() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  script text "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "  script text ");
    }
}
