use std::{future::Future, num::NonZeroUsize, time::Duration};

use kube::Error as KubeError;
use tokio::time::sleep;
use tracing::debug;

/// Exponential wait between two attempts of a discovery request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    /// Upper bound of any single wait.
    pub max: Duration,
    /// Growth factor, never below `1.0`.
    pub factor: f64,
}

impl Backoff {
    /// Retry immediately.
    pub const NONE: Backoff = Backoff {
        initial: Duration::ZERO,
        max: Duration::ZERO,
        factor: 1.0,
    };

    /// Waits before the second, third, ... attempt. The sequence never ends.
    pub fn delays(self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial.min(self.max)), move |delay| {
            Some(self.grow(*delay))
        })
    }

    fn grow(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor.max(1.0))
            .map_or(self.max, |next| next.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
            factor: 2.0,
        }
    }
}

/// Retry policy applied to each discovery request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first call. `None` keeps retrying until the
    /// request succeeds or fails with a non-retryable error.
    pub max_attempts: Option<NonZeroUsize>,
    pub backoff: Backoff,
    pub is_retryable: fn(&KubeError) -> bool,
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn never() -> Self {
        Self::default().with_max_attempts(NonZeroUsize::MIN)
    }

    pub fn with_max_attempts(self, max_attempts: NonZeroUsize) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..self
        }
    }

    pub fn with_unlimited_attempts(self) -> Self {
        Self {
            max_attempts: None,
            ..self
        }
    }

    pub fn with_backoff(self, backoff: Backoff) -> Self {
        Self { backoff, ..self }
    }

    pub fn with_retryable(self, is_retryable: fn(&KubeError) -> bool) -> Self {
        Self {
            is_retryable,
            ..self
        }
    }

    fn allows_another(&self, attempts: usize) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max.get())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroUsize::new(5),
            backoff: Backoff::default(),
            is_retryable: default_retryable_error,
        }
    }
}

/// Default retry condition for discovery requests.
///
/// Api errors are retried on `408`, `429` and `5xx`; an aggregated API whose
/// backing service is down answers `503`. Transport and decoding errors are
/// always retried.
pub fn default_retryable_error(error: &KubeError) -> bool {
    match error {
        KubeError::Api(status) => matches!(status.code, 408 | 429 | 500..=599),
        _ => true,
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, KubeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KubeError>>,
{
    let mut delays = policy.backoff.delays();
    let mut attempts = 0usize;

    loop {
        attempts = attempts.saturating_add(1);
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !policy.allows_another(attempts) || !(policy.is_retryable)(&error) {
            return Err(error);
        }
        let delay = delays.next().unwrap_or(policy.backoff.max);
        debug!(attempts, ?delay, %error, "Retrying discovery request");
        sleep(delay).await;
    }
}
