//! Media artifacts produced by the pipeline stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::Privacy;

/// Narration audio synthesized from the script.
///
/// Exactly one per run: the output of the first narration provider that
/// produced valid audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationAsset {
    /// Path to the audio file on stable storage.
    pub audio_path: PathBuf,
    /// Measured duration in seconds (always > 0 for a valid asset).
    pub duration_seconds: f64,
    /// Provider that synthesized the audio.
    pub provider_id: String,
}

/// One sourced visual clip or image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualAsset {
    /// Path to the downloaded media file.
    pub media_path: PathBuf,
    /// Provider the media came from.
    pub provider_id: String,
    /// Keyword the media was matched against.
    pub matched_keyword: String,
}

/// The final rendered video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeVideo {
    /// Path to the rendered video file.
    pub video_path: PathBuf,
    /// Exported key frame for use as a thumbnail (if export succeeded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    /// Measured duration in seconds.
    pub duration_seconds: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Whether captions were burned into the frames.
    pub captions_embedded: bool,
}

/// Record of a successful publish call.
///
/// Created only after the upload succeeded; its presence in the run state
/// is the single source of truth for "this run already published".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Video id assigned by the platform.
    pub remote_video_id: String,
    /// Watch URL.
    pub url: String,
    /// Privacy the video was published with.
    pub privacy: Privacy,
    /// Upload completion time (RFC 3339).
    pub uploaded_at: String,
}
