/// Text-completion client abstraction
///
/// The generation pipeline only ever needs "prompt in, raw text out". Clients
/// classify failures into [`TransportError`] so callers can tell a slow or
/// missing service (fall back now) from a flaky connection (retried here).
use rand::Rng;
use std::{future::Future, time::Duration};

pub mod openai;

pub use openai::OpenAiClient;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("generation service is not configured")]
    Unavailable,

    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection to generation service failed: {0}")]
    Connection(String),

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Transient failures worth another attempt within the retry budget
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection(_) | TransportError::MalformedEnvelope(_) => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Unavailable | TransportError::Timeout(_) => false,
        }
    }

    /// The service is absent or too slow; use the local synthesizer instead
    pub fn warrants_fallback(&self) -> bool {
        matches!(self, TransportError::Unavailable | TransportError::Timeout(_))
    }
}

/// A single external text-completion endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    /// Sends `prompt` and returns the raw completion text.
    ///
    /// `timeout` bounds the whole call, retries included.
    async fn call(&self, prompt: &str, timeout: Duration) -> Result<String, TransportError>;

    /// Client name for logging
    fn name(&self) -> &'static str;
}

/// Bounded exponential backoff for transient transport failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given attempt (0-indexed)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_backoff.as_secs_f64() * multiplier;
        let capped = delay.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Backoff delay scaled by a random factor in `[0.5, 1.0]`
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.backoff_delay(attempt).mul_f64(rng.gen_range(0.5..=1.0))
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// Runs `attempt_fn` until it succeeds, fails permanently, or the policy is exhausted
pub async fn call_with_retry<F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<String, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn(attempt).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && !policy.is_exhausted(attempt) => {
                let delay = {
                    let mut rng = rand::thread_rng();
                    policy.jittered_delay(attempt, &mut rng)
                };
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient generation failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
