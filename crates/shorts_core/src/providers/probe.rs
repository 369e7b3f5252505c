//! Media probing using ffprobe.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

use super::process::run_with_deadline;
use super::{ProviderCtx, ProviderError, ProviderResult};

/// Measure the duration of a media file in seconds.
///
/// Uses `ffprobe -show_format` JSON output; works for both audio and
/// video containers.
pub fn media_duration_seconds(
    ffprobe_bin: &str,
    path: &Path,
    ctx: &ProviderCtx,
) -> ProviderResult<f64> {
    if !path.exists() {
        return Err(ProviderError::invalid_output(format!(
            "media file not found: {}",
            path.display()
        )));
    }

    let mut cmd = Command::new(ffprobe_bin);
    cmd.args(["-v", "error", "-show_format", "-of", "json"]);
    cmd.arg(path);

    let output = run_with_deadline(cmd, "ffprobe", ctx)?;

    let json: Value = serde_json::from_str(&output.stdout).map_err(|e| {
        ProviderError::invalid_output(format!("ffprobe returned unparseable JSON: {}", e))
    })?;

    let duration = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| {
            ProviderError::invalid_output(format!(
                "no duration reported for {}",
                path.display()
            ))
        })?;

    if duration <= 0.0 {
        return Err(ProviderError::invalid_output(format!(
            "non-positive duration {:.3}s for {}",
            duration,
            path.display()
        )));
    }

    Ok(duration)
}
