//! Capability providers and fallback chains.
//!
//! Every external function the pipeline depends on (script text, keywords,
//! narration audio, visual media, rendering, publishing) is behind the
//! [`CapabilityProvider`] contract. A capability can have several ranked
//! implementations; a [`FallbackChain`] tries them in order and returns the
//! first valid result.

mod chain;
mod keywords;
mod narration;
mod probe;
mod process;
mod publish;
mod registry;
mod render;
mod script;
mod visuals;

pub use chain::{AttemptError, ChainError, ChainSuccess, FallbackChain};
pub use keywords::{HeuristicKeywordProvider, KeywordRequest, LlmKeywordProvider};
pub use narration::{EspeakProvider, NarrationRequest, SpeechApiProvider, SynthesizedAudio};
pub use probe::media_duration_seconds;
pub use process::{run_with_deadline, CommandOutput};
pub use publish::{generate_metadata, PublishRequest, VideoMetadata, YouTubeProvider};
pub use registry::{ProviderRegistry, RegistryError};
pub use render::{FfmpegRenderer, RenderRequest};
pub use script::{build_script_prompt, ChatCompletionProvider, ChatPrompt};
pub use visuals::{PexelsProvider, PixabayProvider, VisualRequest};

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::logging::RunLogger;

/// Error from a single provider attempt.
///
/// These stay local to the fallback chain: a failed attempt only triggers
/// the next provider, never aborts the stage by itself.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The attempt exceeded its timeout.
    #[error("timed out after {elapsed_secs:.1}s")]
    Timeout { elapsed_secs: f64 },

    /// The provider returned output that failed validation.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// An HTTP request failed.
    #[error("request failed{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    RequestFailed { status: Option<u16>, message: String },

    /// An external command failed.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl ProviderError {
    /// Create a timeout error.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a request failed error.
    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Classify a reqwest error, preserving timeouts.
    pub fn from_http(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::timeout(timeout)
        } else {
            Self::request_failed(error.status().map(|s| s.as_u16()), error.to_string())
        }
    }

    /// Whether this error was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for provider attempts.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Context handed to each provider attempt.
///
/// Carries the attempt deadline (already capped to the stage budget), the
/// run-scoped working directory, and the run logger.
pub struct ProviderCtx<'a> {
    /// Hard deadline for this attempt.
    pub deadline: Instant,
    /// Run-scoped directory for artifacts.
    pub work_dir: &'a Path,
    /// Per-run logger.
    pub logger: &'a RunLogger,
}

impl<'a> ProviderCtx<'a> {
    /// Create a provider context.
    pub fn new(deadline: Instant, work_dir: &'a Path, logger: &'a RunLogger) -> Self {
        Self {
            deadline,
            work_dir,
            logger,
        }
    }

    /// Copy with a tighter deadline.
    pub fn with_deadline(&self, deadline: Instant) -> ProviderCtx<'a> {
        ProviderCtx {
            deadline,
            work_dir: self.work_dir,
            logger: self.logger,
        }
    }

    /// Time left before the deadline (zero if passed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Uniform contract for one externally supplied function.
///
/// Each implementation wraps one provider (an HTTP API, a local tool) for
/// one capability. The pipeline depends only on this contract, never on
/// provider internals.
pub trait CapabilityProvider<Req, Resp>: Send + Sync {
    /// Identifier recorded in artifacts and error records.
    fn id(&self) -> &str;

    /// Perform one attempt. Must respect `ctx.deadline` as well as it can
    /// (HTTP request timeout, subprocess kill); the chain treats a late
    /// return the same as a failure.
    fn invoke(&self, request: &Req, ctx: &ProviderCtx) -> ProviderResult<Resp>;
}
