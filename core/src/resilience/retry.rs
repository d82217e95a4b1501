//! Retry policy with exponential backoff and a retryable-error predicate.
//!
//! Every external call in this service — model, retrieval, tool RPC, KV
//! reads/writes, blob I/O — is wrapped by a [`RetryPolicy`]. The policy is a
//! plain value: it does not own a clock or a sleeper, so it is trivial to
//! unit test the delay sequence without waiting in real time.

use std::time::Duration;

use rand::Rng;

/// Classifies whether a failure is worth retrying.
///
/// Mirrors the taxonomy in the service's error-handling design: transient
/// transport errors, rate limiting, timeouts, and a configured set of
/// service-specific throttling codes are retryable; anything else is not.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Backoff and retry configuration for a single external service.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before attempt `attempt` (0-indexed: the delay *after* the
    /// `attempt`-th failure, before the `attempt + 1`-th try).
    ///
    /// `min(max_delay, base_delay * multiplier^attempt)`, plus uniform
    /// jitter within ±10% when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt as i32);
        let raw = self.base_delay.as_secs_f64() * exp;
        let capped = raw.min(self.max_delay.as_secs_f64());

        let with_jitter = if self.jitter {
            let jitter_frac = rand::thread_rng().gen_range(-0.1..=0.1);
            (capped * (1.0 + jitter_frac)).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(with_jitter)
    }

    /// Whether another attempt should be made given the number of attempts
    /// already made and whether the last error was retryable.
    pub fn should_retry(&self, attempts_made: u32, last_error_retryable: bool) -> bool {
        last_error_retryable && attempts_made < self.max_attempts
    }

    /// Run `op` under this policy, sleeping between attempts. `op` returns a
    /// `Result<T, E>` where `E: RetryableError`. Returns the last error if
    /// every attempt is exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if !self.should_retry(attempt, e.is_retryable()) {
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay_for_attempt(attempt - 1)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Conservative default: 3 attempts, 1s base delay, 60s cap.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Named presets mirroring the service-specific retry configurations
/// enumerated in the configuration surface: model, KV store, analytics
/// (more lenient), tool RPC, embedding.
pub struct RetryPresets;

impl RetryPresets {
    pub fn model() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    pub fn kv_store() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(200), Duration::from_secs(5))
    }

    pub fn analytics() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(500), Duration::from_secs(10))
    }

    pub fn tool_rpc() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(15))
    }

    pub fn embedding() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(20))
    }
}
