//! Fallback chain: ranked providers for one capability.
//!
//! Providers are tried strictly in rank order (fixed by configuration,
//! never reordered at runtime). An attempt fails if the provider errors,
//! times out, or returns output that fails the capability's validation
//! predicate. Same-provider retries use exponential backoff; exhausting
//! every provider fails the chain.

use std::thread;
use std::time::{Duration, Instant};

use super::{CapabilityProvider, ProviderCtx, ProviderError};

/// One recorded failed attempt.
#[derive(Debug)]
pub struct AttemptError {
    /// Provider that failed.
    pub provider_id: String,
    /// What went wrong.
    pub error: ProviderError,
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.error)
    }
}

/// Successful chain execution.
#[derive(Debug)]
pub struct ChainSuccess<Resp> {
    /// The first valid response.
    pub value: Resp,
    /// Provider that produced it.
    pub provider_id: String,
    /// Attempts that failed before the success (possibly empty).
    pub attempts: Vec<AttemptError>,
}

/// Chain-level failure.
#[derive(Debug)]
pub enum ChainError {
    /// Every provider in the chain was tried and failed.
    Exhausted {
        capability: String,
        attempts: Vec<AttemptError>,
    },
    /// The stage deadline passed before the chain could finish.
    DeadlineExceeded {
        capability: String,
        attempts: Vec<AttemptError>,
    },
}

impl ChainError {
    /// The failed attempts recorded before the chain gave up.
    pub fn attempts(&self) -> &[AttemptError] {
        match self {
            ChainError::Exhausted { attempts, .. } => attempts,
            ChainError::DeadlineExceeded { attempts, .. } => attempts,
        }
    }

    /// Consume the error, returning the recorded attempts.
    pub fn into_attempts(self) -> Vec<AttemptError> {
        match self {
            ChainError::Exhausted { attempts, .. } => attempts,
            ChainError::DeadlineExceeded { attempts, .. } => attempts,
        }
    }
}

/// Validation predicate applied to every provider response.
type Validator<Resp> = Box<dyn Fn(&Resp) -> Result<(), String> + Send + Sync>;

/// One provider in a chain, with its attempt policy.
struct ChainEntry<Req, Resp> {
    provider: Box<dyn CapabilityProvider<Req, Resp>>,
    /// Per-attempt timeout.
    timeout: Duration,
    /// Extra same-provider retries after the first attempt.
    retries: u32,
    /// Base backoff between same-provider retries.
    backoff: Duration,
}

/// Ranked providers for one capability.
pub struct FallbackChain<Req, Resp> {
    capability: String,
    entries: Vec<ChainEntry<Req, Resp>>,
    validate: Validator<Resp>,
}

impl<Req, Resp> FallbackChain<Req, Resp> {
    /// Create an empty chain with a validation predicate.
    pub fn new(
        capability: impl Into<String>,
        validate: impl Fn(&Resp) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            capability: capability.into(),
            entries: Vec::new(),
            validate: Box::new(validate),
        }
    }

    /// Append a provider at the next rank.
    pub fn push(
        &mut self,
        provider: Box<dyn CapabilityProvider<Req, Resp>>,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) {
        self.entries.push(ChainEntry {
            provider,
            timeout,
            retries,
            backoff,
        });
    }

    /// Append a provider (builder pattern).
    pub fn with_provider(
        mut self,
        provider: Box<dyn CapabilityProvider<Req, Resp>>,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) -> Self {
        self.push(provider, timeout, retries, backoff);
        self
    }

    /// Capability name this chain serves.
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provider ids in rank order.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.provider.id()).collect()
    }

    /// Try providers in rank order until one returns a valid response.
    ///
    /// Returns the first success together with the id of the provider that
    /// served it and any attempt errors collected on the way. No provider
    /// after the first success is invoked.
    pub fn execute(
        &self,
        request: &Req,
        ctx: &ProviderCtx,
    ) -> Result<ChainSuccess<Resp>, ChainError> {
        let mut attempts = Vec::new();

        for entry in &self.entries {
            let provider_id = entry.provider.id().to_string();

            for attempt in 0..=entry.retries {
                if attempt > 0 {
                    // Exponential backoff between same-provider retries,
                    // clamped to the stage deadline.
                    let backoff = entry.backoff * 2u32.saturating_pow(attempt - 1);
                    if Instant::now() + backoff >= ctx.deadline {
                        return Err(ChainError::DeadlineExceeded {
                            capability: self.capability.clone(),
                            attempts,
                        });
                    }
                    thread::sleep(backoff);
                }

                let now = Instant::now();
                if now >= ctx.deadline {
                    return Err(ChainError::DeadlineExceeded {
                        capability: self.capability.clone(),
                        attempts,
                    });
                }

                ctx.logger.attempt(&format!(
                    "{} via '{}' ({}/{})",
                    self.capability,
                    provider_id,
                    attempt + 1,
                    entry.retries + 1
                ));

                let attempt_deadline = std::cmp::min(ctx.deadline, now + entry.timeout);
                let attempt_ctx = ctx.with_deadline(attempt_deadline);

                match entry.provider.invoke(request, &attempt_ctx) {
                    Ok(response) => match (self.validate)(&response) {
                        Ok(()) => {
                            return Ok(ChainSuccess {
                                value: response,
                                provider_id,
                                attempts,
                            });
                        }
                        Err(reason) => {
                            ctx.logger.warn(&format!(
                                "{} output from '{}' rejected: {}",
                                self.capability, provider_id, reason
                            ));
                            attempts.push(AttemptError {
                                provider_id: provider_id.clone(),
                                error: ProviderError::invalid_output(reason),
                            });
                        }
                    },
                    Err(error) => {
                        ctx.logger.warn(&format!(
                            "{} via '{}' failed: {}",
                            self.capability, provider_id, error
                        ));
                        attempts.push(AttemptError {
                            provider_id: provider_id.clone(),
                            error,
                        });
                    }
                }
            }
        }

        Err(ChainError::Exhausted {
            capability: self.capability.clone(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogConfig, RunLogger};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Provider that fails a fixed number of times, then succeeds.
    struct FlakyProvider {
        id: &'static str,
        failures_before_success: usize,
        calls: Arc<AtomicUsize>,
    }

    impl CapabilityProvider<String, String> for FlakyProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn invoke(&self, request: &String, _ctx: &ProviderCtx) -> Result<String, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(ProviderError::request_failed(Some(500), "server error"))
            } else {
                Ok(format!("{} by {}", request, self.id))
            }
        }
    }

    fn flaky(
        id: &'static str,
        failures: usize,
    ) -> (Box<dyn CapabilityProvider<String, String>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FlakyProvider {
            id,
            failures_before_success: failures,
            calls: calls.clone(),
        };
        (Box::new(provider), calls)
    }

    fn test_ctx_parts() -> (tempfile::TempDir, RunLogger) {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("chain-test", dir.path(), LogConfig::default(), None).unwrap();
        (dir, logger)
    }

    fn accept_all(_: &String) -> Result<(), String> {
        Ok(())
    }

    #[test]
    fn first_success_wins_and_later_providers_are_not_invoked() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(
            Instant::now() + Duration::from_secs(10),
            dir.path(),
            &logger,
        );

        let (a, a_calls) = flaky("a", usize::MAX); // always fails
        let (b, b_calls) = flaky("b", 0); // succeeds
        let (c, c_calls) = flaky("c", 0); // should never run

        let mut chain = FallbackChain::new("script", accept_all);
        chain.push(a, Duration::from_secs(5), 0, Duration::from_millis(1));
        chain.push(b, Duration::from_secs(5), 0, Duration::from_millis(1));
        chain.push(c, Duration::from_secs(5), 0, Duration::from_millis(1));

        let success = chain.execute(&"req".to_string(), &ctx).unwrap();
        assert_eq!(success.provider_id, "b");
        assert_eq!(success.value, "req by b");
        assert_eq!(success.attempts.len(), 1);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn retries_same_provider_before_falling_back() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(
            Instant::now() + Duration::from_secs(10),
            dir.path(),
            &logger,
        );

        let (a, a_calls) = flaky("a", 2); // fails twice, succeeds third
        let mut chain = FallbackChain::new("script", accept_all);
        chain.push(a, Duration::from_secs(5), 2, Duration::from_millis(1));

        let success = chain.execute(&"req".to_string(), &ctx).unwrap();
        assert_eq!(success.provider_id, "a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 3);
        assert_eq!(success.attempts.len(), 2);
    }

    #[test]
    fn invalid_output_moves_to_next_provider() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(
            Instant::now() + Duration::from_secs(10),
            dir.path(),
            &logger,
        );

        let (a, _) = flaky("a", 0);
        let (b, _) = flaky("b", 0);

        // Reject provider a's output.
        let mut chain = FallbackChain::new("script", |resp: &String| {
            if resp.ends_with("by a") {
                Err("too short".to_string())
            } else {
                Ok(())
            }
        });
        chain.push(a, Duration::from_secs(5), 0, Duration::from_millis(1));
        chain.push(b, Duration::from_secs(5), 0, Duration::from_millis(1));

        let success = chain.execute(&"req".to_string(), &ctx).unwrap();
        assert_eq!(success.provider_id, "b");
        assert!(matches!(
            success.attempts[0].error,
            ProviderError::InvalidOutput(_)
        ));
    }

    #[test]
    fn exhausted_chain_reports_all_attempts() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(
            Instant::now() + Duration::from_secs(10),
            dir.path(),
            &logger,
        );

        let (a, _) = flaky("a", usize::MAX);
        let (b, _) = flaky("b", usize::MAX);

        let mut chain = FallbackChain::new("narration", accept_all);
        chain.push(a, Duration::from_secs(5), 1, Duration::from_millis(1));
        chain.push(b, Duration::from_secs(5), 0, Duration::from_millis(1));

        let err = chain.execute(&"req".to_string(), &ctx).unwrap_err();
        match err {
            ChainError::Exhausted {
                capability,
                attempts,
            } => {
                assert_eq!(capability, "narration");
                // 2 attempts for a (1 retry), 1 for b
                assert_eq!(attempts.len(), 3);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn expired_deadline_stops_the_chain() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(Instant::now() - Duration::from_secs(1), dir.path(), &logger);

        let (a, a_calls) = flaky("a", 0);
        let mut chain = FallbackChain::new("script", accept_all);
        chain.push(a, Duration::from_secs(5), 0, Duration::from_millis(1));

        let err = chain.execute(&"req".to_string(), &ctx).unwrap_err();
        assert!(matches!(err, ChainError::DeadlineExceeded { .. }));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_is_immediately_exhausted() {
        let (dir, logger) = test_ctx_parts();
        let ctx = ProviderCtx::new(
            Instant::now() + Duration::from_secs(10),
            dir.path(),
            &logger,
        );

        let chain: FallbackChain<String, String> = FallbackChain::new("visuals", accept_all);
        assert!(chain.is_empty());
        let err = chain.execute(&"req".to_string(), &ctx).unwrap_err();
        assert!(matches!(err, ChainError::Exhausted { .. }));
    }
}
