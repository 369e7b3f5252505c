//! Publishing to the video platform (YouTube Data API).
//!
//! Uses the two-step resumable upload protocol: initiate with the video
//! metadata, then PUT the bytes to the returned session URL. The exported
//! key frame is set as the thumbnail afterwards (best-effort).

use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::models::{Privacy, PublishResult, Topic};

use super::script::effective_timeout;
use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request to publish one video.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Rendered video file.
    pub video_path: PathBuf,
    /// Optional thumbnail image.
    pub thumbnail_path: Option<PathBuf>,
    /// Video title.
    pub title: String,
    /// Video description.
    pub description: String,
    /// Video tags.
    pub tags: Vec<String>,
    /// Platform category id.
    pub category_id: String,
    /// Privacy status.
    pub privacy: Privacy,
}

/// Generated video metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Maximum title length accepted by the platform is 100; stay under it.
const TITLE_LIMIT: usize = 95;

/// Joined tag characters accepted by the platform.
const TAGS_CHAR_LIMIT: usize = 500;

/// Generate title, description, and tags for a video.
///
/// Titles are keyed off the category where a known prefix exists,
/// otherwise picked deterministically from a template list. The
/// description embeds a script excerpt.
pub fn generate_metadata(topic: &Topic, script: &str) -> VideoMetadata {
    let title = generate_title(&topic.text, &topic.category);
    let description = generate_description(&topic.text, &topic.category, script);
    let tags = generate_tags(&topic.text, &topic.category);

    VideoMetadata {
        title,
        description,
        tags,
    }
}

fn generate_title(topic: &str, category: &str) -> String {
    let title = match category.to_lowercase().as_str() {
        "mystery" => format!("MYSTERY: {}", topic),
        "science" => format!("SCIENCE: {}", topic),
        "history" => format!("HISTORY: {}", topic),
        "technology" => format!("TECH: {}", topic),
        _ => {
            let templates = [
                format!("{} #shorts", topic),
                format!("This Will Blow Your Mind: {}", topic),
                format!("You Won't Believe: {}", topic),
                format!("Mind-Blowing: {}", topic),
            ];
            // Deterministic pick keyed off the topic.
            let index = topic.chars().count() % templates.len();
            templates[index].clone()
        }
    };

    if title.chars().count() > TITLE_LIMIT {
        let mut truncated: String = title.chars().take(TITLE_LIMIT - 3).collect();
        truncated.push_str("...");
        truncated
    } else {
        title
    }
}

fn generate_description(topic: &str, category: &str, script: &str) -> String {
    let excerpt = if script.chars().count() > 200 {
        let head: String = script.chars().take(200).collect();
        format!("{}...", head)
    } else {
        script.to_string()
    };

    let category_tag: String = category
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    format!(
        "{topic}\n\n{excerpt}\n\n\
         Subscribe for more daily facts.\n\n\
         #shorts #facts #daily #{category_tag}",
        topic = topic,
        excerpt = excerpt,
        category_tag = category_tag,
    )
}

fn generate_tags(topic: &str, category: &str) -> Vec<String> {
    let mut tags: Vec<String> = [
        "shorts",
        "facts",
        "amazing",
        "viral",
        "trending",
        "incredible",
        "educational",
        "fascinating",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect();

    let category_tags: &[&str] = match category.to_lowercase().as_str() {
        "history" => &["history", "historical", "past", "ancient"],
        "science" => &["science", "research", "discovery"],
        "technology" => &["technology", "tech", "innovation"],
        "mystery" => &["mystery", "unexplained", "strange"],
        "nature" => &["nature", "animals", "wildlife"],
        "space" => &["space", "universe", "astronomy"],
        _ => &[],
    };
    for tag in category_tags {
        tags.push(tag.to_string());
    }

    for word in crate::models::topic_words(topic) {
        if !tags.contains(&word) {
            tags.push(word);
        }
    }

    // Platform limit on the joined tag list length.
    while tags.join(",").chars().count() > TAGS_CHAR_LIMIT && tags.len() > 8 {
        tags.pop();
    }

    tags
}

/// YouTube Data API publisher.
pub struct YouTubeProvider {
    id: String,
    api_base: String,
    token: String,
    upload_thumbnail: bool,
    client: reqwest::blocking::Client,
}

impl YouTubeProvider {
    pub fn new(
        id: impl Into<String>,
        api_base: impl Into<String>,
        token: impl Into<String>,
        upload_thumbnail: bool,
    ) -> Self {
        Self {
            id: id.into(),
            api_base: api_base.into(),
            token: token.into(),
            upload_thumbnail,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Start a resumable upload session, returning the session URL.
    fn initiate_session(
        &self,
        request: &PublishRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<String> {
        let timeout = effective_timeout(ctx);
        let url = format!(
            "{}/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status",
            self.api_base
        );

        let body = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
                "categoryId": request.category_id,
            },
            "status": {
                "privacyStatus": request.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Upload-Content-Type", "video/mp4")
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::invalid_output("upload session response had no location header")
            })
    }

    /// Upload the video bytes to the session URL, returning the video id.
    fn upload_bytes(
        &self,
        session_url: &str,
        request: &PublishRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<String> {
        let timeout = effective_timeout(ctx);

        let bytes = fs::read(&request.video_path)
            .map_err(|e| ProviderError::io("reading video file", e))?;

        ctx.logger.info(&format!(
            "Uploading {} ({:.1} MB)",
            request
                .video_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy(),
            bytes.len() as f64 / (1024.0 * 1024.0)
        ));

        let response = self
            .client
            .put(session_url)
            .bearer_auth(&self.token)
            .header("Content-Type", "video/mp4")
            .timeout(timeout)
            .body(bytes)
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        let parsed: Value = response
            .json()
            .map_err(|e| ProviderError::invalid_output(format!("unparseable response: {}", e)))?;

        parsed
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::invalid_output("upload response had no video id"))
    }

    /// Set the video thumbnail. Best-effort: failures are logged.
    fn set_thumbnail(&self, video_id: &str, thumbnail: &PathBuf, ctx: &ProviderCtx) {
        let timeout = effective_timeout(ctx);
        let url = format!(
            "{}/upload/youtube/v3/thumbnails/set?videoId={}",
            self.api_base, video_id
        );

        let bytes = match fs::read(thumbnail) {
            Ok(b) => b,
            Err(e) => {
                ctx.logger
                    .warn(&format!("could not read thumbnail: {}", e));
                return;
            }
        };

        let result = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "image/jpeg")
            .timeout(timeout)
            .body(bytes)
            .send();

        match result {
            Ok(response) if response.status().is_success() => {
                ctx.logger.info("Thumbnail set");
            }
            Ok(response) => {
                ctx.logger.warn(&format!(
                    "thumbnail upload rejected ({})",
                    response.status()
                ));
            }
            Err(e) => {
                ctx.logger.warn(&format!("thumbnail upload failed: {}", e));
            }
        }
    }
}

impl CapabilityProvider<PublishRequest, PublishResult> for YouTubeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, request: &PublishRequest, ctx: &ProviderCtx) -> ProviderResult<PublishResult> {
        if !request.video_path.exists() {
            return Err(ProviderError::invalid_output(format!(
                "video file not found: {}",
                request.video_path.display()
            )));
        }

        let session_url = self.initiate_session(request, ctx)?;
        let video_id = self.upload_bytes(&session_url, request, ctx)?;

        ctx.logger
            .success(&format!("Uploaded video: {}", video_id));

        if self.upload_thumbnail {
            if let Some(ref thumbnail) = request.thumbnail_path {
                self.set_thumbnail(&video_id, thumbnail, ctx);
            }
        }

        Ok(PublishResult {
            url: format!("https://youtube.com/watch?v={}", video_id),
            remote_video_id: video_id,
            privacy: request.privacy,
            uploaded_at: chrono::Local::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicSource;

    fn topic(text: &str, category: &str) -> Topic {
        Topic::new(text, category, TopicSource::Scheduled)
    }

    #[test]
    fn known_category_gets_prefix() {
        let meta = generate_metadata(&topic("volcanoes", "Science"), "script");
        assert_eq!(meta.title, "SCIENCE: volcanoes");
    }

    #[test]
    fn unknown_category_uses_templates_deterministically() {
        let a = generate_metadata(&topic("forgotten toys", "Nostalgia"), "script");
        let b = generate_metadata(&topic("forgotten toys", "Nostalgia"), "script");
        assert_eq!(a.title, b.title);
        assert!(a.title.contains("forgotten toys"));
    }

    #[test]
    fn long_title_is_truncated() {
        let long_topic = "a".repeat(150);
        let meta = generate_metadata(&topic(&long_topic, "Science"), "script");
        assert!(meta.title.chars().count() <= TITLE_LIMIT);
        assert!(meta.title.ends_with("..."));
    }

    #[test]
    fn description_embeds_script_excerpt() {
        let script = "x".repeat(300);
        let meta = generate_metadata(&topic("volcanoes", "Science"), &script);
        assert!(meta.description.contains(&"x".repeat(200)));
        assert!(meta.description.contains("..."));
        assert!(meta.description.contains("#science"));
    }

    #[test]
    fn tags_include_category_and_topic_words() {
        let meta = generate_metadata(&topic("ancient pyramid discovery", "History"), "script");
        assert!(meta.tags.contains(&"history".to_string()));
        assert!(meta.tags.contains(&"pyramid".to_string()));
        assert!(meta.tags.contains(&"discovery".to_string()));
    }

    #[test]
    fn tags_respect_joined_length_limit() {
        let long_topic = (0..100)
            .map(|i| format!("keyword{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let meta = generate_metadata(&topic(&long_topic, "Science"), "script");
        assert!(meta.tags.join(",").chars().count() <= TAGS_CHAR_LIMIT);
        assert!(meta.tags.len() >= 8);
    }
}
