//! Narration synthesis providers.
//!
//! Primary: a hosted neural speech API. Fallback: local espeak-ng, which
//! sounds simpler but never needs a network. Both write their audio into
//! the run's working directory and report the measured duration.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;

use super::probe::media_duration_seconds;
use super::process::run_with_deadline;
use super::script::effective_timeout;
use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request for narration synthesis.
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    /// Script text to narrate.
    pub script_text: String,
    /// Output path without extension; the provider appends its own
    /// (`.mp3` or `.wav`).
    pub output_stem: PathBuf,
}

/// Synthesized narration audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// Path to the written audio file.
    pub path: PathBuf,
    /// Measured duration in seconds.
    pub duration_seconds: f64,
}

#[derive(Serialize)]
struct SpeechRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<String>,
}

/// Hosted neural text-to-speech API (ElevenLabs-compatible).
pub struct SpeechApiProvider {
    id: String,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: Option<String>,
    ffprobe_bin: String,
    client: reqwest::blocking::Client,
}

impl SpeechApiProvider {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        model_id: Option<String>,
        ffprobe_bin: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id,
            ffprobe_bin: ffprobe_bin.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl CapabilityProvider<NarrationRequest, SynthesizedAudio> for SpeechApiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(
        &self,
        request: &NarrationRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<SynthesizedAudio> {
        let timeout = effective_timeout(ctx);
        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice_id);

        let body = SpeechRequest {
            text: request.script_text.clone(),
            model_id: self.model_id.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        let audio = response
            .bytes()
            .map_err(|e| ProviderError::from_http(e, timeout))?;
        if audio.is_empty() {
            return Err(ProviderError::invalid_output("empty audio response"));
        }

        let path = request.output_stem.with_extension("mp3");
        fs::write(&path, &audio).map_err(|e| ProviderError::io("writing narration audio", e))?;

        let duration_seconds = media_duration_seconds(&self.ffprobe_bin, &path, ctx)?;

        Ok(SynthesizedAudio {
            path,
            duration_seconds,
        })
    }
}

/// Local espeak-ng synthesis.
///
/// The script is passed via a text file to avoid argument length limits.
pub struct EspeakProvider {
    id: String,
    voice: String,
    words_per_minute: u32,
    binary: String,
    ffprobe_bin: String,
}

impl EspeakProvider {
    pub fn new(
        id: impl Into<String>,
        voice: impl Into<String>,
        words_per_minute: u32,
        ffprobe_bin: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            voice: voice.into(),
            words_per_minute,
            binary: "espeak-ng".to_string(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Use a custom espeak binary (name or path).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl CapabilityProvider<NarrationRequest, SynthesizedAudio> for EspeakProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(
        &self,
        request: &NarrationRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<SynthesizedAudio> {
        let text_path = request.output_stem.with_extension("txt");
        let wav_path = request.output_stem.with_extension("wav");

        fs::write(&text_path, &request.script_text)
            .map_err(|e| ProviderError::io("writing narration text", e))?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-v").arg(&self.voice);
        cmd.arg("-s").arg(self.words_per_minute.to_string());
        cmd.arg("-f").arg(&text_path);
        cmd.arg("-w").arg(&wav_path);

        let result = run_with_deadline(cmd, "espeak-ng", ctx);

        // The prompt file is scratch either way.
        let _ = fs::remove_file(&text_path);
        result?;

        let duration_seconds = media_duration_seconds(&self.ffprobe_bin, &wav_path, ctx)?;

        Ok(SynthesizedAudio {
            path: wav_path,
            duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_request_omits_absent_model() {
        let body = SpeechRequest {
            text: "hello".to_string(),
            model_id: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, "{\"text\":\"hello\"}");
    }

    #[test]
    fn espeak_uses_configured_binary() {
        let provider =
            EspeakProvider::new("espeak", "en-US", 160, "ffprobe").with_binary("/opt/espeak-ng");
        assert_eq!(provider.binary, "/opt/espeak-ng");
        assert_eq!(CapabilityProvider::<NarrationRequest, _>::id(&provider), "espeak");
    }
}
