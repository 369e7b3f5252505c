//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a default so a partial config file still loads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;
use crate::models::{Privacy, RunStage};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Run budgets and script parameters.
    #[serde(default)]
    pub run: RunSettings,

    /// Video rendering settings.
    #[serde(default)]
    pub video: VideoSettings,

    /// Topic schedule settings.
    #[serde(default)]
    pub schedule: ScheduleSettings,

    /// Capability provider chains, in rank order.
    #[serde(default)]
    pub providers: ProvidersSettings,

    /// Publish settings.
    #[serde(default)]
    pub publish: PublishSettings,

    /// Failure notification settings.
    #[serde(default)]
    pub notify: NotifySettings,
}

/// Path configuration for output, state, work, and log directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for published video copies.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-run working directories.
    #[serde(default = "default_work_root")]
    pub work_root: String,

    /// Folder for persisted run state records.
    #[serde(default = "default_state_folder")]
    pub state_folder: String,

    /// Folder for per-run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "shorts_output".to_string()
}

fn default_work_root() -> String {
    ".work".to_string()
}

fn default_state_folder() -> String {
    ".state".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            work_root: default_work_root(),
            state_folder: default_state_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (tool output only in the error tail).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool-output lines to keep for the error tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Show timestamps in per-run log files.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: default_true(),
            error_tail: default_error_tail(),
            show_timestamps: default_true(),
        }
    }
}

impl LoggingSettings {
    /// Convert to the run-logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            compact: self.compact,
            error_tail: self.error_tail as usize,
            show_timestamps: self.show_timestamps,
            ..LogConfig::default()
        }
    }
}

/// Run budgets and script parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Global wall-clock budget for a whole run, in seconds.
    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,

    /// Budget for the scripting stage.
    #[serde(default = "default_script_budget")]
    pub script_budget_secs: u64,

    /// Budget for the keyword extraction stage.
    #[serde(default = "default_keywords_budget")]
    pub keywords_budget_secs: u64,

    /// Budget for the visual sourcing stage.
    #[serde(default = "default_visuals_budget")]
    pub visuals_budget_secs: u64,

    /// Budget for the narration synthesis stage.
    #[serde(default = "default_narration_budget")]
    pub narration_budget_secs: u64,

    /// Budget for the compositing stage.
    #[serde(default = "default_composite_budget")]
    pub composite_budget_secs: u64,

    /// Budget for the publish stage.
    #[serde(default = "default_publish_budget")]
    pub publish_budget_secs: u64,

    /// Assumed narration pace, used to estimate spoken duration from the
    /// script before audio exists.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// Minimum acceptable script length in characters.
    #[serde(default = "default_min_script_chars")]
    pub min_script_chars: usize,

    /// Maximum number of keywords to extract.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

fn default_run_budget() -> u64 {
    1800
}

fn default_script_budget() -> u64 {
    120
}

fn default_keywords_budget() -> u64 {
    60
}

fn default_visuals_budget() -> u64 {
    180
}

fn default_narration_budget() -> u64 {
    300
}

fn default_composite_budget() -> u64 {
    600
}

fn default_publish_budget() -> u64 {
    900
}

fn default_words_per_minute() -> u32 {
    150
}

fn default_min_script_chars() -> usize {
    200
}

fn default_max_keywords() -> usize {
    8
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            run_budget_secs: default_run_budget(),
            script_budget_secs: default_script_budget(),
            keywords_budget_secs: default_keywords_budget(),
            visuals_budget_secs: default_visuals_budget(),
            narration_budget_secs: default_narration_budget(),
            composite_budget_secs: default_composite_budget(),
            publish_budget_secs: default_publish_budget(),
            words_per_minute: default_words_per_minute(),
            min_script_chars: default_min_script_chars(),
            max_keywords: default_max_keywords(),
        }
    }
}

impl RunSettings {
    /// Wall-clock budget for one stage.
    pub fn budget_for(&self, stage: RunStage) -> Duration {
        let secs = match stage {
            RunStage::Scripting => self.script_budget_secs,
            RunStage::ExtractingKeywords => self.keywords_budget_secs,
            RunStage::SourcingMedia => self.visuals_budget_secs,
            RunStage::SynthesizingAudio => self.narration_budget_secs,
            RunStage::Compositing => self.composite_budget_secs,
            RunStage::Publishing => self.publish_budget_secs,
            _ => self.run_budget_secs,
        };
        Duration::from_secs(secs)
    }

    /// Global wall-clock budget for the whole run.
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

/// Video rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Frame width (portrait shorts format).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Seconds each sourced visual stays on screen.
    #[serde(default = "default_per_clip_secs")]
    pub per_clip_secs: f64,

    /// Upper bound on the number of visual clips per video.
    #[serde(default = "default_max_clips")]
    pub max_clips: usize,

    /// Background color for degraded (no-media) runs.
    #[serde(default = "default_background_color")]
    pub background_color: String,

    /// Font file used for caption burn-in.
    #[serde(default = "default_font_file")]
    pub font_file: String,

    /// Whether to burn captions into the video.
    #[serde(default = "default_true")]
    pub captions: bool,

    /// Silence appended after the narration ends, in seconds.
    #[serde(default = "default_tail_padding")]
    pub tail_padding_secs: f64,

    /// ffmpeg executable (name or path).
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    /// ffprobe executable (name or path).
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_fps() -> u32 {
    30
}

fn default_per_clip_secs() -> f64 {
    4.0
}

fn default_max_clips() -> usize {
    12
}

fn default_background_color() -> String {
    "black".to_string()
}

fn default_font_file() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string()
}

fn default_tail_padding() -> f64 {
    0.5
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            per_clip_secs: default_per_clip_secs(),
            max_clips: default_max_clips(),
            background_color: default_background_color(),
            font_file: default_font_file(),
            captions: default_true(),
            tail_padding_secs: default_tail_padding(),
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
        }
    }
}

/// One slot in the weekday rotation: a category and its topic pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSlot {
    /// Category label for the slot.
    pub category: String,
    /// Topics to rotate through within the slot.
    pub topics: Vec<String>,
}

/// Topic schedule settings.
///
/// Scalar fields come before the rotation table so the section
/// serializes cleanly to TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// RSS feed for the trending topic source.
    #[serde(default = "default_trending_feed")]
    pub trending_feed_url: String,

    /// Number of trending entries to consider.
    #[serde(default = "default_trending_count")]
    pub trending_count: usize,

    /// Weekday rotation table; slot index = weekday % slot count.
    #[serde(default = "default_rotation")]
    pub rotation: Vec<RotationSlot>,
}

fn default_rotation() -> Vec<RotationSlot> {
    let slot = |category: &str, topics: &[&str]| RotationSlot {
        category: category.to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
    };
    vec![
        slot(
            "Rare Historical Image",
            &[
                "A 1911 photo of a floating house in Venice",
                "The last known photo of the Titanic before sinking",
                "When elephants were used in 1940s construction",
            ],
        ),
        slot(
            "Banned or Forgotten Object",
            &[
                "This cereal was banned for causing hallucinations",
                "Toys that were banned in the 90s",
                "A book cover so scary it got pulled from shelves",
            ],
        ),
        slot(
            "Alt History",
            &[
                "What if Julius Caesar had a smartphone",
                "If Beethoven was a modern DJ",
                "Einstein as a video game character",
            ],
        ),
        slot(
            "Hidden or Abandoned Places",
            &[
                "A ghost town in California no one visits",
                "An underwater city off the coast of Japan",
                "A pyramid found in the middle of the jungle",
            ],
        ),
        slot(
            "Childhood Toys Reimagined",
            &[
                "That 90s slime toy, rediscovered",
                "What Furbies almost looked like",
                "Remember HitClips?",
            ],
        ),
    ]
}

fn default_trending_feed() -> String {
    "https://trends.google.com/trends/trendingsearches/daily/rss?geo=US".to_string()
}

fn default_trending_count() -> usize {
    5
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            trending_feed_url: default_trending_feed(),
            trending_count: default_trending_count(),
            rotation: default_rotation(),
        }
    }
}

/// One provider in a capability chain.
///
/// Fields are interpreted per `kind`; unused fields stay empty. Rank order
/// is the list order in the config file and is never reordered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSlot {
    /// Identifier recorded in artifacts and error records.
    pub id: String,

    /// Adapter kind: `chat_completion`, `heuristic`, `speech_api`, `espeak`,
    /// `pexels`, `pixabay`, `youtube`.
    pub kind: String,

    /// API base URL (HTTP kinds).
    #[serde(default)]
    pub base_url: String,

    /// Model name (chat/speech kinds).
    #[serde(default)]
    pub model: String,

    /// Voice id (speech kinds).
    #[serde(default)]
    pub voice: String,

    /// Environment variable holding the credential. Empty = no credential
    /// needed. Providers whose credential is missing at registration are
    /// skipped with a warning.
    #[serde(default)]
    pub api_key_env: String,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Extra same-provider retries after the first attempt.
    #[serde(default)]
    pub retries: u32,

    /// Base backoff between same-provider retries, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_backoff_ms() -> u64 {
    500
}

impl ProviderSlot {
    /// Minimal slot for a given adapter kind.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            base_url: String::new(),
            model: String::new(),
            voice: String::new(),
            api_key_env: String::new(),
            timeout_secs: default_provider_timeout(),
            retries: 0,
            backoff_ms: default_backoff_ms(),
        }
    }

    /// Per-attempt timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry backoff base as a duration.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Capability provider chains, in rank order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersSettings {
    /// Script generation providers.
    #[serde(default = "default_script_providers")]
    pub script: Vec<ProviderSlot>,

    /// Keyword extraction providers.
    #[serde(default = "default_keyword_providers")]
    pub keywords: Vec<ProviderSlot>,

    /// Narration synthesis providers.
    #[serde(default = "default_narration_providers")]
    pub narration: Vec<ProviderSlot>,

    /// Visual sourcing providers.
    #[serde(default = "default_visual_providers")]
    pub visuals: Vec<ProviderSlot>,

    /// Publish providers.
    #[serde(default = "default_publish_providers")]
    pub publish: Vec<ProviderSlot>,
}

fn default_script_providers() -> Vec<ProviderSlot> {
    vec![
        ProviderSlot {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 90,
            retries: 1,
            ..ProviderSlot::new("openai", "chat_completion")
        },
        ProviderSlot {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 120,
            ..ProviderSlot::new("local-llm", "chat_completion")
        },
    ]
}

fn default_keyword_providers() -> Vec<ProviderSlot> {
    vec![
        ProviderSlot {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            ..ProviderSlot::new("openai-keywords", "chat_completion")
        },
        ProviderSlot::new("frequency", "heuristic"),
    ]
}

fn default_narration_providers() -> Vec<ProviderSlot> {
    vec![
        ProviderSlot {
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            model: "eleven_multilingual_v2".to_string(),
            voice: "21m00Tcm4TlvDq8ikWAM".to_string(),
            api_key_env: "ELEVENLABS_API_KEY".to_string(),
            timeout_secs: 120,
            retries: 1,
            ..ProviderSlot::new("neural-tts", "speech_api")
        },
        ProviderSlot {
            voice: "en-US".to_string(),
            timeout_secs: 60,
            ..ProviderSlot::new("espeak", "espeak")
        },
    ]
}

fn default_visual_providers() -> Vec<ProviderSlot> {
    vec![
        ProviderSlot {
            base_url: "https://api.pexels.com/v1".to_string(),
            api_key_env: "PEXELS_API_KEY".to_string(),
            timeout_secs: 60,
            ..ProviderSlot::new("pexels", "pexels")
        },
        ProviderSlot {
            base_url: "https://pixabay.com/api".to_string(),
            api_key_env: "PIXABAY_API_KEY".to_string(),
            timeout_secs: 60,
            ..ProviderSlot::new("pixabay", "pixabay")
        },
    ]
}

fn default_publish_providers() -> Vec<ProviderSlot> {
    vec![ProviderSlot {
        base_url: "https://www.googleapis.com".to_string(),
        api_key_env: "YOUTUBE_TOKEN".to_string(),
        timeout_secs: 600,
        ..ProviderSlot::new("youtube", "youtube")
    }]
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            script: default_script_providers(),
            keywords: default_keyword_providers(),
            narration: default_narration_providers(),
            visuals: default_visual_providers(),
            publish: default_publish_providers(),
        }
    }
}

/// Publish settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSettings {
    /// Privacy status for published videos.
    #[serde(default)]
    pub privacy: Privacy,

    /// Platform category id (22 = People & Blogs).
    #[serde(default = "default_category_id")]
    pub category_id: String,

    /// Upload the exported key frame as the video thumbnail.
    #[serde(default = "default_true")]
    pub upload_thumbnail: bool,
}

fn default_category_id() -> String {
    "22".to_string()
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            privacy: Privacy::default(),
            category_id: default_category_id(),
            upload_thumbnail: default_true(),
        }
    }
}

/// Failure notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Webhook URL for failure notifications. None disables notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Number of trailing error records to include in the summary.
    #[serde(default = "default_notify_errors")]
    pub max_errors: usize,

    /// Webhook request timeout in seconds.
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_errors() -> usize {
    5
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_errors: default_notify_errors(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::default();
        assert_eq!(settings.video.width, 1080);
        assert_eq!(settings.video.height, 1920);
        assert_eq!(settings.schedule.rotation.len(), 5);
        assert_eq!(settings.providers.script.len(), 2);
        assert_eq!(settings.providers.narration.len(), 2);
        assert_eq!(settings.providers.publish.len(), 1);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [video]
            width = 720

            [[providers.script]]
            id = "my-llm"
            kind = "chat_completion"
            base_url = "https://example.com/v1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.video.width, 720);
        assert_eq!(settings.video.height, 1920);
        assert_eq!(settings.providers.script.len(), 1);
        assert_eq!(settings.providers.script[0].id, "my-llm");
        assert_eq!(settings.providers.script[0].timeout_secs, 60);
        // Untouched sections keep their defaults
        assert_eq!(settings.providers.narration.len(), 2);
    }

    #[test]
    fn budgets_map_to_stages() {
        let run = RunSettings::default();
        assert_eq!(
            run.budget_for(RunStage::Scripting),
            Duration::from_secs(120)
        );
        assert_eq!(
            run.budget_for(RunStage::Publishing),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.schedule.rotation, settings.schedule.rotation);
        assert_eq!(back.providers.script, settings.providers.script);
    }
}
