//! Bounded-latency, bounded-retry wrapper shared by every pipeline stage.
//!
//! Each attempt runs the model call on its own tokio task and joins it under a
//! timeout. When the timeout fires the join handle is dropped, which detaches the
//! task rather than cancelling it: a client that does not observe cancellation
//! may keep running (and holding its connection) after the attempt is abandoned.
//! Callers get a hard wall-clock ceiling; resource release is best-effort.

use std::sync::Arc;
use std::time::Duration;

use crate::clients::traits::{GenerativeModel, ModelError, ModelPrompt};
use crate::error::{ProfilerError, Result};

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Retry budget, per-attempt timeout and the fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub retries: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Successful model output and the attempt it arrived on (1-based)
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub attempts: u32,
}

impl Generation {
    /// Attempts that failed or timed out before this one succeeded
    pub fn failed_attempts(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Clone)]
pub struct ResilientModel {
    inner: Arc<dyn GenerativeModel>,
    policy: CallPolicy,
}

impl ResilientModel {
    pub fn new(inner: Arc<dyn GenerativeModel>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    pub async fn generate_text(&self, text: impl Into<String>) -> Result<Generation> {
        self.generate(&ModelPrompt::text(text)).await
    }

    /// Invoke the model until one attempt succeeds or the budget is spent.
    /// Exhausting the budget is the single `CapabilityUnavailable` escalation point.
    pub async fn generate(&self, prompt: &ModelPrompt) -> Result<Generation> {
        let retries = self.policy.retries.max(1);
        let timeout_ms = self.policy.timeout.as_millis() as u64;

        for attempt in 1..=retries {
            let model = Arc::clone(&self.inner);
            let owned = prompt.clone();
            let handle = tokio::spawn(async move { model.generate(&owned).await });

            let outcome = match tokio::time::timeout(self.policy.timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(ModelError::Join(join_err.to_string())),
                Err(_) => Err(ModelError::Timeout { timeout_ms }),
            };

            match outcome {
                Ok(text) => {
                    tracing::info!(attempt, retries, "Model call successful on attempt {}", attempt);
                    return Ok(Generation {
                        text,
                        attempts: attempt,
                    });
                }
                Err(ModelError::Timeout { timeout_ms }) => {
                    tracing::error!(
                        attempt,
                        retries,
                        "Attempt {}/{} timed out after {}ms",
                        attempt,
                        retries,
                        timeout_ms
                    );
                }
                Err(e) => {
                    tracing::error!(attempt, retries, "Attempt {}/{} failed: {}", attempt, retries, e);
                }
            }

            if attempt < retries {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(ProfilerError::CapabilityUnavailable { attempts: retries })
    }
}
