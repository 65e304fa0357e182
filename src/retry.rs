use crate::config::RetryConfig;
use crate::error::FailureKind;
use crate::gateway::Gateway;
use crate::models::{Completion, Message};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Result of a retried gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Success(Completion),
    /// The call did not succeed; `attempts` counts every call made
    Failure { kind: FailureKind, attempts: u32 },
}

/// How often and how patiently to retry a gateway call
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    /// Delay before retry number `n` (1-based)
    backoff: Arc<dyn Fn(u32) -> Duration + Send + Sync>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// A policy with a custom backoff function; at least one attempt is always made
    pub fn new(max_attempts: u32, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// Delay starts at `base` and doubles with every retry
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, move |retry| {
            let factor = 2u32.saturating_pow(retry.saturating_sub(1));
            base.saturating_mul(factor)
        })
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::exponential(config.max_attempts, config.base_delay())
    }

    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        (self.backoff)(retry)
    }

    /// Call the gateway until it succeeds, fails fatally, or attempts run out
    pub async fn complete(
        &self,
        gateway: &dyn Gateway,
        model: &str,
        conversation: &[Message],
    ) -> RetryOutcome {
        let mut attempt = 1;

        loop {
            match gateway.complete(model, conversation).await {
                Ok(completion) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", model, attempt);
                    }
                    return RetryOutcome::Success(completion);
                }
                Err(error) => {
                    let kind = error.kind();
                    if kind == FailureKind::Fatal || attempt >= self.max_attempts {
                        tracing::error!(
                            "Giving up on {} after {} attempt(s): {}",
                            model,
                            attempt,
                            error
                        );
                        return RetryOutcome::Failure {
                            kind,
                            attempts: attempt,
                        };
                    }

                    let delay = self.delay_before_retry(attempt);
                    tracing::warn!(
                        "Retry {}/{} for {} in {:?} after error: {}",
                        attempt,
                        self.max_attempts - 1,
                        model,
                        delay,
                        error
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
