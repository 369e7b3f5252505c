//! Video compositing via ffmpeg.
//!
//! Builds the final portrait video from the narration audio plus the
//! sourced visuals (or a generated background when the run is degraded),
//! with sentence-timed captions burned in. The ffmpeg invocation is
//! assembled by an argument builder so the command shape is testable
//! without running ffmpeg.

use std::path::PathBuf;
use std::process::Command;

use crate::config::VideoSettings;
use crate::models::{CompositeVideo, VisualAsset};

use super::probe::media_duration_seconds;
use super::process::run_with_deadline;
use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request for compositing the final video.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Narration audio file.
    pub narration_path: PathBuf,
    /// Narration duration in seconds.
    pub narration_seconds: f64,
    /// Visuals in playback order. Empty = degraded run, render a solid
    /// background instead.
    pub visuals: Vec<VisualAsset>,
    /// Script text for caption burn-in.
    pub script_text: String,
    /// Where to write the video.
    pub output_path: PathBuf,
    /// Where to write the exported key frame.
    pub thumbnail_path: PathBuf,
    /// Rendering parameters.
    pub video: VideoSettings,
}

impl RenderRequest {
    /// Total video duration: narration plus tail padding.
    pub fn total_seconds(&self) -> f64 {
        self.narration_seconds + self.video.tail_padding_secs
    }
}

/// One caption with its display window.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Split script text into caption sentences.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// Time caption sentences proportionally to their length over the
/// narration duration.
pub fn caption_segments(text: &str, narration_seconds: f64) -> Vec<CaptionSegment> {
    let sentences = split_sentences(text);
    if sentences.is_empty() || narration_seconds <= 0.0 {
        return Vec::new();
    }

    let total_chars: usize = sentences.iter().map(|s| s.chars().count()).sum();
    let mut segments = Vec::with_capacity(sentences.len());
    let mut cursor = 0.0;

    for sentence in sentences {
        let share = sentence.chars().count() as f64 / total_chars.max(1) as f64;
        let duration = share * narration_seconds;
        segments.push(CaptionSegment {
            text: sentence,
            start: cursor,
            end: cursor + duration,
        });
        cursor += duration;
    }

    segments
}

/// Escape text for an ffmpeg drawtext value.
///
/// The value is wrapped in single quotes by the builder, so only the
/// quote itself (replaced by a typographic apostrophe), backslashes, and
/// the expansion character need handling.
fn escape_drawtext(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\\' => "\\\\".to_string(),
            '\'' => "\u{2019}".to_string(),
            '%' => "\\%".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Builder for the ffmpeg compositing command line.
struct FfmpegArgsBuilder<'a> {
    request: &'a RenderRequest,
}

impl<'a> FfmpegArgsBuilder<'a> {
    fn new(request: &'a RenderRequest) -> Self {
        Self { request }
    }

    /// Assemble the full argument list.
    fn build(&self) -> Vec<String> {
        let req = self.request;
        let video = &req.video;
        let total = req.total_seconds();

        let mut args: Vec<String> = vec!["-y".into()];

        // Visual inputs: one looped image per clip, or a generated
        // background for a degraded run.
        let visual_inputs = req.visuals.len().max(1);
        if req.visuals.is_empty() {
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c={}:s={}x{}:r={}:d={:.3}",
                    video.background_color, video.width, video.height, video.fps, total
                ),
            ]);
        } else {
            let per_clip = total / req.visuals.len() as f64;
            for visual in &req.visuals {
                args.extend([
                    "-loop".into(),
                    "1".into(),
                    "-t".into(),
                    format!("{:.3}", per_clip),
                    "-i".into(),
                    visual.media_path.to_string_lossy().to_string(),
                ]);
            }
        }

        // Narration audio input.
        args.extend([
            "-i".into(),
            req.narration_path.to_string_lossy().to_string(),
        ]);

        args.extend(["-filter_complex".into(), self.filter_graph()]);

        args.extend([
            "-map".into(),
            "[vout]".into(),
            "-map".into(),
            format!("{}:a", visual_inputs),
            "-t".into(),
            format!("{:.3}", total),
            "-r".into(),
            video.fps.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            req.output_path.to_string_lossy().to_string(),
        ]);

        args
    }

    /// Build the filter graph: scale/crop each input, concat, captions.
    fn filter_graph(&self) -> String {
        let req = self.request;
        let video = &req.video;
        let mut graph = String::new();

        let base_label = if req.visuals.is_empty() {
            // Generated background is already the right size.
            "0:v".to_string()
        } else {
            for i in 0..req.visuals.len() {
                graph.push_str(&format!(
                    "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=increase,\
                     crop={w}:{h},setsar=1,fps={fps}[v{i}];",
                    i = i,
                    w = video.width,
                    h = video.height,
                    fps = video.fps
                ));
            }
            for i in 0..req.visuals.len() {
                graph.push_str(&format!("[v{}]", i));
            }
            graph.push_str(&format!(
                "concat=n={}:v=1:a=0[base];",
                req.visuals.len()
            ));
            "base".to_string()
        };

        let captions = if video.captions {
            caption_segments(&req.script_text, req.narration_seconds)
        } else {
            Vec::new()
        };

        if captions.is_empty() {
            graph.push_str(&format!("[{}]null[vout]", base_label));
            return graph;
        }

        let fontsize = (video.height / 30).max(24);
        let margin = video.height / 10;

        graph.push_str(&format!("[{}]", base_label));
        for (i, segment) in captions.iter().enumerate() {
            if i > 0 {
                graph.push(',');
            }
            graph.push_str(&format!(
                "drawtext=fontfile={font}:text='{text}':fontcolor=white:fontsize={size}:\
                 borderw=3:bordercolor=black:x=(w-text_w)/2:y=h-text_h-{margin}:\
                 enable='between(t,{start:.2},{end:.2})'",
                font = video.font_file,
                text = escape_drawtext(&segment.text),
                size = fontsize,
                margin = margin,
                start = segment.start,
                end = segment.end,
            ));
        }
        graph.push_str("[vout]");

        graph
    }
}

/// ffmpeg-based compositor.
pub struct FfmpegRenderer {
    id: String,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegRenderer {
    pub fn new(
        id: impl Into<String>,
        ffmpeg_bin: impl Into<String>,
        ffprobe_bin: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Export a key frame for use as a thumbnail.
    ///
    /// Best-effort: a failure is logged, not propagated.
    fn export_thumbnail(&self, request: &RenderRequest, ctx: &ProviderCtx) -> Option<PathBuf> {
        let seek = (request.total_seconds() / 4.0).min(1.0).max(0.0);

        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.arg("-y");
        cmd.arg("-ss").arg(format!("{:.2}", seek));
        cmd.arg("-i").arg(&request.output_path);
        cmd.args(["-frames:v", "1"]);
        cmd.arg(&request.thumbnail_path);

        match run_with_deadline(cmd, "ffmpeg", ctx) {
            Ok(_) if request.thumbnail_path.exists() => Some(request.thumbnail_path.clone()),
            Ok(_) => None,
            Err(e) => {
                ctx.logger.warn(&format!("thumbnail export failed: {}", e));
                None
            }
        }
    }
}

impl CapabilityProvider<RenderRequest, CompositeVideo> for FfmpegRenderer {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, request: &RenderRequest, ctx: &ProviderCtx) -> ProviderResult<CompositeVideo> {
        if !request.narration_path.exists() {
            return Err(ProviderError::invalid_output(format!(
                "narration file not found: {}",
                request.narration_path.display()
            )));
        }

        let args = FfmpegArgsBuilder::new(request).build();

        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(&args);
        run_with_deadline(cmd, "ffmpeg", ctx)?;

        let duration_seconds =
            media_duration_seconds(&self.ffprobe_bin, &request.output_path, ctx)?;

        let thumbnail_path = self.export_thumbnail(request, ctx);

        Ok(CompositeVideo {
            video_path: request.output_path.clone(),
            thumbnail_path,
            duration_seconds,
            width: request.video.width,
            height: request.video.height,
            captions_embedded: request.video.captions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request(visuals: Vec<VisualAsset>) -> RenderRequest {
        RenderRequest {
            narration_path: PathBuf::from("/work/narration.mp3"),
            narration_seconds: 40.0,
            visuals,
            script_text: "First fact. Second, longer fact here!".to_string(),
            output_path: PathBuf::from("/work/short.mp4"),
            thumbnail_path: PathBuf::from("/work/thumbnail.jpg"),
            video: VideoSettings::default(),
        }
    }

    fn visual(path: &str) -> VisualAsset {
        VisualAsset {
            media_path: PathBuf::from(path),
            provider_id: "pexels".to_string(),
            matched_keyword: "volcano".to_string(),
        }
    }

    #[test]
    fn caption_segments_cover_narration() {
        let segments = caption_segments("One. Two. Three.", 30.0);
        assert_eq!(segments.len(), 3);
        assert!((segments[0].start - 0.0).abs() < 0.01);
        assert!((segments.last().unwrap().end - 30.0).abs() < 0.01);
        // Segments are contiguous
        assert!((segments[0].end - segments[1].start).abs() < 0.001);
    }

    #[test]
    fn caption_segments_without_punctuation() {
        let segments = caption_segments("no punctuation at all", 10.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "no punctuation at all");
    }

    #[test]
    fn escape_drawtext_handles_specials() {
        assert_eq!(escape_drawtext("it's 100%"), "it\u{2019}s 100\\%");
        assert_eq!(escape_drawtext("a\\b"), "a\\\\b");
    }

    #[test]
    fn builder_uses_one_input_per_visual() {
        let request = test_request(vec![visual("/work/v0.jpg"), visual("/work/v1.jpg")]);
        let args = FfmpegArgsBuilder::new(&request).build();

        let inputs = args.iter().filter(|a| *a == "-i").count();
        // two visuals + narration
        assert_eq!(inputs, 3);
        // audio mapped from the input after the visuals
        assert!(args.contains(&"2:a".to_string()));
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_pos + 1].contains("concat=n=2"));
    }

    #[test]
    fn builder_degrades_to_generated_background() {
        let request = test_request(vec![]);
        let args = FfmpegArgsBuilder::new(&request).build();

        let lavfi = args.iter().any(|a| a == "lavfi");
        assert!(lavfi);
        let color = args
            .iter()
            .any(|a| a.starts_with("color=c=black:s=1080x1920"));
        assert!(color);
        // narration is input 1 when the background is input 0
        assert!(args.contains(&"1:a".to_string()));
    }

    #[test]
    fn builder_burns_captions_by_default() {
        let request = test_request(vec![visual("/work/v0.jpg")]);
        let args = FfmpegArgsBuilder::new(&request).build();
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &args[graph_pos + 1];
        assert!(graph.contains("drawtext="));
        assert!(graph.contains("enable='between(t,"));
        assert!(graph.ends_with("[vout]"));
    }

    #[test]
    fn builder_skips_captions_when_disabled() {
        let mut request = test_request(vec![visual("/work/v0.jpg")]);
        request.video.captions = false;
        let args = FfmpegArgsBuilder::new(&request).build();
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(!args[graph_pos + 1].contains("drawtext"));
    }

    #[test]
    fn total_includes_tail_padding() {
        let request = test_request(vec![]);
        assert!((request.total_seconds() - 40.5).abs() < 0.001);
    }
}
