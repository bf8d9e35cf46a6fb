use rand::Rng;
use std::fmt;
use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Service asked us to slow down (429, quota, resource exhausted).
    RateLimited,
    /// Network failure or retryable server error (500, 503, RPC failure).
    Transient,
    /// Anything else (bad request, auth, schema). Never retried.
    Fatal,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Attempt budget plus the two backoff schedules.
///
/// Transient failures use plain exponential backoff from `base_delay`.
/// Rate-limited failures wait a uniformly drawn duration inside
/// `rate_limit_min..=rate_limit_max`, independent of `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first transient retry; doubles after every wait.
    pub base_delay: Duration,
    /// Lower bound of the rate-limit wait.
    pub rate_limit_min: Duration,
    /// Upper bound of the rate-limit wait.
    pub rate_limit_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            rate_limit_min: Duration::from_millis(5000),
            rate_limit_max: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Policy with `retries` retries after the first attempt.
    pub fn with_retries(retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Transient delay after `attempt` failures. Every earlier wait (of either
    /// kind) doubled the base, so this is `base * 2^(attempt-1)`, saturating
    /// at `Duration::MAX` once that overflows.
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Decide what to do after `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        self.decide_with_rng(attempt, kind, &mut rand::thread_rng())
    }

    /// Same as [`decide`](Self::decide) with a caller-supplied RNG for the
    /// rate-limit jitter.
    pub fn decide_with_rng<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        kind: ErrorKind,
        rng: &mut R,
    ) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Fatal => RetryDecision::NoRetry,
            ErrorKind::Transient => RetryDecision::RetryAfter(self.transient_delay(attempt)),
            ErrorKind::RateLimited => {
                let lo = self.rate_limit_min.as_millis() as u64;
                let hi = (self.rate_limit_max.as_millis() as u64).max(lo);
                RetryDecision::RetryAfter(Duration::from_millis(rng.gen_range(lo..=hi)))
            }
        }
    }
}
