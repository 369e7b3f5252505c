//! Visual sourcing providers (stock image APIs).
//!
//! Both providers download portrait-oriented images matched to the
//! extracted keywords into the run's working directory. Keywords are
//! cycled when there are fewer keywords than requested clips.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::VisualAsset;

use super::script::effective_timeout;
use super::{CapabilityProvider, ProviderCtx, ProviderError, ProviderResult};

/// Request for visual sourcing.
#[derive(Debug, Clone)]
pub struct VisualRequest {
    /// Keywords in extraction rank order.
    pub keywords: Vec<String>,
    /// Number of clips wanted.
    pub count: usize,
    /// Directory to download media into.
    pub dest_dir: PathBuf,
}

impl VisualRequest {
    /// Distribute the clip count across keywords round-robin.
    ///
    /// Returns (keyword, wanted) pairs in keyword rank order.
    fn quota(&self) -> Vec<(String, usize)> {
        if self.keywords.is_empty() || self.count == 0 {
            return Vec::new();
        }
        let mut quota: Vec<(String, usize)> =
            self.keywords.iter().map(|k| (k.clone(), 0)).collect();
        for i in 0..self.count {
            quota[i % self.keywords.len()].1 += 1;
        }
        quota.retain(|(_, wanted)| *wanted > 0);
        quota
    }
}

/// Make a keyword safe for use in a filename.
fn filename_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Download a URL to a file, erroring on empty bodies.
fn download_to(
    client: &reqwest::blocking::Client,
    url: &str,
    path: &Path,
    ctx: &ProviderCtx,
) -> ProviderResult<()> {
    let timeout = effective_timeout(ctx);
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .map_err(|e| ProviderError::from_http(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::request_failed(
            Some(status.as_u16()),
            format!("media download failed for {}", url),
        ));
    }

    let bytes = response
        .bytes()
        .map_err(|e| ProviderError::from_http(e, timeout))?;
    if bytes.is_empty() {
        return Err(ProviderError::invalid_output("empty media download"));
    }

    fs::write(path, &bytes).map_err(|e| ProviderError::io("writing media file", e))?;
    Ok(())
}

// --- Pexels ---------------------------------------------------------------

#[derive(Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    portrait: String,
}

/// Pexels photo search provider.
pub struct PexelsProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl PexelsProvider {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn search(
        &self,
        keyword: &str,
        wanted: usize,
        ctx: &ProviderCtx,
    ) -> ProviderResult<Vec<String>> {
        let timeout = effective_timeout(ctx);
        let url = format!("{}/search", self.base_url);

        let per_page = wanted.to_string();
        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", keyword),
                ("per_page", per_page.as_str()),
                ("orientation", "portrait"),
            ])
            .timeout(timeout)
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        let parsed: PexelsSearchResponse = response
            .json()
            .map_err(|e| ProviderError::invalid_output(format!("unparseable response: {}", e)))?;

        Ok(parsed.photos.into_iter().map(|p| p.src.portrait).collect())
    }
}

impl CapabilityProvider<VisualRequest, Vec<VisualAsset>> for PexelsProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(
        &self,
        request: &VisualRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<Vec<VisualAsset>> {
        fs::create_dir_all(&request.dest_dir)
            .map_err(|e| ProviderError::io("creating media directory", e))?;

        let mut assets = Vec::new();
        for (keyword, wanted) in request.quota() {
            let urls = match self.search(&keyword, wanted, ctx) {
                Ok(urls) => urls,
                Err(e) => {
                    ctx.logger
                        .warn(&format!("search for '{}' failed: {}", keyword, e));
                    continue;
                }
            };

            for url in urls.iter().take(wanted) {
                let path = request.dest_dir.join(format!(
                    "visual_{:02}_{}.jpg",
                    assets.len(),
                    filename_keyword(&keyword)
                ));
                match download_to(&self.client, url, &path, ctx) {
                    Ok(()) => assets.push(VisualAsset {
                        media_path: path,
                        provider_id: self.id.clone(),
                        matched_keyword: keyword.clone(),
                    }),
                    Err(e) => {
                        ctx.logger.warn(&format!("download failed: {}", e));
                    }
                }
            }
        }

        if assets.is_empty() {
            return Err(ProviderError::invalid_output(
                "no media found for any keyword",
            ));
        }
        Ok(assets)
    }
}

// --- Pixabay --------------------------------------------------------------

#[derive(Deserialize)]
struct PixabaySearchResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
}

/// Pixabay image search provider.
pub struct PixabayProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl PixabayProvider {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn search(
        &self,
        keyword: &str,
        wanted: usize,
        ctx: &ProviderCtx,
    ) -> ProviderResult<Vec<String>> {
        let timeout = effective_timeout(ctx);

        // Pixabay rejects per_page below 3.
        let per_page = wanted.max(3).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", keyword),
                ("image_type", "photo"),
                ("orientation", "vertical"),
                ("per_page", per_page.as_str()),
            ])
            .timeout(timeout)
            .send()
            .map_err(|e| ProviderError::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::request_failed(Some(status.as_u16()), text));
        }

        let parsed: PixabaySearchResponse = response
            .json()
            .map_err(|e| ProviderError::invalid_output(format!("unparseable response: {}", e)))?;

        Ok(parsed
            .hits
            .into_iter()
            .map(|h| h.large_image_url)
            .collect())
    }
}

impl CapabilityProvider<VisualRequest, Vec<VisualAsset>> for PixabayProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(
        &self,
        request: &VisualRequest,
        ctx: &ProviderCtx,
    ) -> ProviderResult<Vec<VisualAsset>> {
        fs::create_dir_all(&request.dest_dir)
            .map_err(|e| ProviderError::io("creating media directory", e))?;

        let mut assets = Vec::new();
        for (keyword, wanted) in request.quota() {
            let urls = match self.search(&keyword, wanted, ctx) {
                Ok(urls) => urls,
                Err(e) => {
                    ctx.logger
                        .warn(&format!("search for '{}' failed: {}", keyword, e));
                    continue;
                }
            };

            for url in urls.iter().take(wanted) {
                let path = request.dest_dir.join(format!(
                    "visual_{:02}_{}.jpg",
                    assets.len(),
                    filename_keyword(&keyword)
                ));
                match download_to(&self.client, url, &path, ctx) {
                    Ok(()) => assets.push(VisualAsset {
                        media_path: path,
                        provider_id: self.id.clone(),
                        matched_keyword: keyword.clone(),
                    }),
                    Err(e) => {
                        ctx.logger.warn(&format!("download failed: {}", e));
                    }
                }
            }
        }

        if assets.is_empty() {
            return Err(ProviderError::invalid_output(
                "no media found for any keyword",
            ));
        }
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_cycles_keywords() {
        let request = VisualRequest {
            keywords: vec!["volcano".to_string(), "lava".to_string()],
            count: 5,
            dest_dir: PathBuf::from("/tmp"),
        };
        let quota = request.quota();
        assert_eq!(
            quota,
            vec![("volcano".to_string(), 3), ("lava".to_string(), 2)]
        );
    }

    #[test]
    fn quota_handles_more_keywords_than_clips() {
        let request = VisualRequest {
            keywords: vec!["a".into(), "b".into(), "c".into()],
            count: 2,
            dest_dir: PathBuf::from("/tmp"),
        };
        let quota = request.quota();
        assert_eq!(quota, vec![("a".to_string(), 1), ("b".to_string(), 1)]);
    }

    #[test]
    fn quota_empty_without_keywords() {
        let request = VisualRequest {
            keywords: vec![],
            count: 4,
            dest_dir: PathBuf::from("/tmp"),
        };
        assert!(request.quota().is_empty());
    }

    #[test]
    fn filename_keyword_is_safe() {
        assert_eq!(filename_keyword("lava flow"), "lava_flow");
        assert_eq!(filename_keyword("a/b:c"), "a_b_c");
    }

    #[test]
    fn pixabay_hit_parses_camel_case() {
        let json = r#"{"hits":[{"largeImageURL":"https://example.com/x.jpg"}]}"#;
        let parsed: PixabaySearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.hits[0].large_image_url, "https://example.com/x.jpg");
    }
}
