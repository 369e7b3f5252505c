//! Provider registry: builds the capability chains from configuration.
//!
//! Availability checks happen once here, at registration: a provider whose
//! credential is missing from the environment is skipped with a warning
//! and never consulted mid-pipeline. Rank order is the configuration
//! order.

use std::env;

use thiserror::Error;

use crate::config::{ProviderSlot, Settings};
use crate::models::{CompositeVideo, PublishResult, VisualAsset};

use super::chain::FallbackChain;
use super::keywords::{HeuristicKeywordProvider, KeywordRequest, LlmKeywordProvider};
use super::narration::{EspeakProvider, NarrationRequest, SpeechApiProvider, SynthesizedAudio};
use super::publish::{PublishRequest, YouTubeProvider};
use super::render::{FfmpegRenderer, RenderRequest};
use super::script::{ChatCompletionProvider, ChatPrompt};
use super::visuals::{PexelsProvider, PixabayProvider, VisualRequest};

/// Errors from building the provider registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A required capability ended up with no usable providers.
    #[error("no usable providers for required capability '{capability}'")]
    NoProviders { capability: &'static str },

    /// A provider slot names an adapter kind that does not exist.
    #[error("unknown provider kind '{kind}' for '{id}' (capability '{capability}')")]
    UnknownKind {
        capability: &'static str,
        kind: String,
        id: String,
    },
}

/// The capability chains for one run.
pub struct ProviderRegistry {
    pub script: FallbackChain<ChatPrompt, String>,
    pub keywords: FallbackChain<KeywordRequest, Vec<String>>,
    pub narration: FallbackChain<NarrationRequest, SynthesizedAudio>,
    pub visuals: FallbackChain<VisualRequest, Vec<VisualAsset>>,
    pub render: FallbackChain<RenderRequest, CompositeVideo>,
    pub publish: FallbackChain<PublishRequest, PublishResult>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("script", &self.script.provider_ids())
            .field("keywords", &self.keywords.provider_ids())
            .field("narration", &self.narration.provider_ids())
            .field("visuals", &self.visuals.provider_ids())
            .field("render", &self.render.provider_ids())
            .field("publish", &self.publish.provider_ids())
            .finish()
    }
}

impl ProviderRegistry {
    /// Build all chains from settings.
    ///
    /// Required capabilities (script, narration, render, publish) must end
    /// up with at least one provider; recoverable ones (keywords, visuals)
    /// may be empty, in which case their stage degrades immediately.
    pub fn build(settings: &Settings) -> Result<Self, RegistryError> {
        let min_script_chars = settings.run.min_script_chars;
        let mut script = FallbackChain::new("script", move |text: &String| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Err("empty script".to_string())
            } else if trimmed.chars().count() < min_script_chars {
                Err(format!(
                    "script too short ({} chars, need {})",
                    trimmed.chars().count(),
                    min_script_chars
                ))
            } else {
                Ok(())
            }
        });
        for slot in &settings.providers.script {
            let Some(api_key) = resolve_credential(slot, "script") else {
                continue;
            };
            match slot.kind.as_str() {
                "chat_completion" => {
                    let provider = ChatCompletionProvider::new(
                        &slot.id,
                        &slot.base_url,
                        &slot.model,
                        api_key,
                    );
                    script.push(Box::new(provider), slot.timeout(), slot.retries, slot.backoff());
                }
                other => {
                    return Err(RegistryError::UnknownKind {
                        capability: "script",
                        kind: other.to_string(),
                        id: slot.id.clone(),
                    })
                }
            }
        }
        if script.is_empty() {
            return Err(RegistryError::NoProviders {
                capability: "script",
            });
        }

        let mut keywords = FallbackChain::new("keywords", |kws: &Vec<String>| {
            if kws.is_empty() {
                Err("no keywords extracted".to_string())
            } else {
                Ok(())
            }
        });
        for slot in &settings.providers.keywords {
            let Some(api_key) = resolve_credential(slot, "keywords") else {
                continue;
            };
            match slot.kind.as_str() {
                "chat_completion" => {
                    let inner = ChatCompletionProvider::new(
                        &slot.id,
                        &slot.base_url,
                        &slot.model,
                        api_key,
                    );
                    keywords.push(
                        Box::new(LlmKeywordProvider::new(inner)),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                "heuristic" => {
                    keywords.push(
                        Box::new(HeuristicKeywordProvider::new(&slot.id)),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                other => {
                    return Err(RegistryError::UnknownKind {
                        capability: "keywords",
                        kind: other.to_string(),
                        id: slot.id.clone(),
                    })
                }
            }
        }

        let ffprobe_bin = settings.video.ffprobe_bin.clone();
        let mut narration = FallbackChain::new("narration", |audio: &SynthesizedAudio| {
            if audio.duration_seconds <= 0.0 {
                Err(format!(
                    "invalid audio duration {:.3}s",
                    audio.duration_seconds
                ))
            } else if !audio.path.exists() {
                Err(format!("audio file missing: {}", audio.path.display()))
            } else {
                Ok(())
            }
        });
        for slot in &settings.providers.narration {
            let Some(api_key) = resolve_credential(slot, "narration") else {
                continue;
            };
            match slot.kind.as_str() {
                "speech_api" => {
                    let provider = SpeechApiProvider::new(
                        &slot.id,
                        &slot.base_url,
                        api_key.unwrap_or_default(),
                        &slot.voice,
                        (!slot.model.is_empty()).then(|| slot.model.clone()),
                        &ffprobe_bin,
                    );
                    narration.push(
                        Box::new(provider),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                "espeak" => {
                    let provider = EspeakProvider::new(
                        &slot.id,
                        if slot.voice.is_empty() { "en-US" } else { slot.voice.as_str() },
                        settings.run.words_per_minute,
                        &ffprobe_bin,
                    );
                    narration.push(
                        Box::new(provider),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                other => {
                    return Err(RegistryError::UnknownKind {
                        capability: "narration",
                        kind: other.to_string(),
                        id: slot.id.clone(),
                    })
                }
            }
        }
        if narration.is_empty() {
            return Err(RegistryError::NoProviders {
                capability: "narration",
            });
        }

        let mut visuals = FallbackChain::new("visuals", |assets: &Vec<VisualAsset>| {
            if assets.is_empty() {
                Err("no media sourced".to_string())
            } else {
                Ok(())
            }
        });
        for slot in &settings.providers.visuals {
            let Some(api_key) = resolve_credential(slot, "visuals") else {
                continue;
            };
            let api_key = api_key.unwrap_or_default();
            match slot.kind.as_str() {
                "pexels" => {
                    visuals.push(
                        Box::new(PexelsProvider::new(&slot.id, &slot.base_url, api_key)),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                "pixabay" => {
                    visuals.push(
                        Box::new(PixabayProvider::new(&slot.id, &slot.base_url, api_key)),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                other => {
                    return Err(RegistryError::UnknownKind {
                        capability: "visuals",
                        kind: other.to_string(),
                        id: slot.id.clone(),
                    })
                }
            }
        }

        // The renderer is a local tool, configured under [video] rather
        // than as a ranked chain.
        let render = FallbackChain::new("render", |video: &CompositeVideo| {
            if video.duration_seconds <= 0.0 {
                Err("rendered video has no duration".to_string())
            } else if !video.video_path.exists() {
                Err(format!("video file missing: {}", video.video_path.display()))
            } else {
                Ok(())
            }
        })
        .with_provider(
            Box::new(FfmpegRenderer::new(
                "ffmpeg",
                &settings.video.ffmpeg_bin,
                &settings.video.ffprobe_bin,
            )),
            settings.run.budget_for(crate::models::RunStage::Compositing),
            0,
            std::time::Duration::from_millis(500),
        );

        let mut publish = FallbackChain::new("publish", |result: &PublishResult| {
            if result.remote_video_id.is_empty() {
                Err("publish result has no video id".to_string())
            } else {
                Ok(())
            }
        });
        for slot in &settings.providers.publish {
            let Some(api_key) = resolve_credential(slot, "publish") else {
                continue;
            };
            match slot.kind.as_str() {
                "youtube" => {
                    let provider = YouTubeProvider::new(
                        &slot.id,
                        &slot.base_url,
                        api_key.unwrap_or_default(),
                        settings.publish.upload_thumbnail,
                    );
                    publish.push(
                        Box::new(provider),
                        slot.timeout(),
                        slot.retries,
                        slot.backoff(),
                    );
                }
                other => {
                    return Err(RegistryError::UnknownKind {
                        capability: "publish",
                        kind: other.to_string(),
                        id: slot.id.clone(),
                    })
                }
            }
        }
        if publish.is_empty() {
            return Err(RegistryError::NoProviders {
                capability: "publish",
            });
        }

        Ok(Self {
            script,
            keywords,
            narration,
            visuals,
            render,
            publish,
        })
    }
}

/// Resolve a slot's credential from the environment.
///
/// Returns `None` to skip the provider (credential configured but absent),
/// `Some(None)` for credential-less providers, `Some(Some(key))` otherwise.
fn resolve_credential(slot: &ProviderSlot, capability: &str) -> Option<Option<String>> {
    if slot.api_key_env.is_empty() {
        return Some(None);
    }
    match env::var(&slot.api_key_env) {
        Ok(key) if !key.is_empty() => Some(Some(key)),
        _ => {
            tracing::warn!(
                "skipping {} provider '{}': credential {} not set",
                capability,
                slot.id,
                slot.api_key_env
            );
            None
        }
    }
}
