//! Retry with exponential backoff.
//!
//! Producers whose emissions fail in a middleware chain, or listeners that
//! call flaky collaborators, wrap the fallible work in [`retry`] or, when it
//! must stop on shutdown, [`retry_with_signal`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abort::{AbortSignal, sleep};

/// Backoff schedule for retried operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub exponential_base: f64,
    /// Relative jitter in `0.0..=1.0` applied around each delay.
    #[serde(default)]
    pub jitter_factor: f64,
}

impl RetryConfig {
    /// Create a schedule without jitter.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            exponential_base,
            jitter_factor: 0.0,
        }
    }

    /// A single attempt, never retried.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Short schedule for in-process work (3 retries, 10ms..100ms).
    #[must_use]
    pub fn fast() -> Self {
        Self::new(
            3,
            Duration::from_millis(10),
            Duration::from_millis(100),
            2.0,
        )
    }

    /// Schedule for network-bound work (5 retries, 100ms..10s, 10% jitter).
    #[must_use]
    pub fn network() -> Self {
        Self::new(5, Duration::from_millis(100), Duration::from_secs(10), 2.0).with_jitter(0.1)
    }

    /// Set the jitter factor.
    #[must_use]
    pub const fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Delay before retry number `attempt` (1-based); zero for attempt 0.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw_ms = self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms.max(0.0) as u64)
    }

    /// [`delay_for_attempt`](Self::delay_for_attempt) scaled by
    /// `1 - jitter + 2 * jitter * random`, with `random` clamped to `0..=1`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn jittered_delay(&self, attempt: u32, random: f64) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }

        let jitter = self.jitter_factor.min(1.0);
        let multiplier = 1.0 - jitter + 2.0 * jitter * random.clamp(0.0, 1.0);
        Duration::from_millis((base.as_millis() as f64 * multiplier).max(0.0) as u64)
    }

    /// Whether another retry is allowed after `attempt` failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.jittered_delay(attempt, rand::random::<f64>())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::network()
    }
}

#[cfg(feature = "config")]
impl From<&vigil_config::RetrySection> for RetryConfig {
    fn from(section: &vigil_config::RetrySection) -> Self {
        Self::new(
            section.max_attempts,
            Duration::from_millis(section.initial_delay_ms),
            Duration::from_millis(section.max_delay_ms),
            section.exponential_base,
        )
        .with_jitter(section.jitter_factor)
    }
}

/// How a retried operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded.
    Success(T),
    /// Retries ran out, or the error was not retryable.
    Exhausted {
        /// Error from the last attempt.
        error: E,
        /// Attempts made, including the first.
        attempts: u32,
    },
    /// The abort signal fired before an attempt succeeded.
    Aborted,
}

impl<T, E> RetryOutcome<T, E> {
    /// Whether an attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the retry loop was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Collapse into a `Result`, using `abort_error` for [`Self::Aborted`].
    ///
    /// # Errors
    ///
    /// Returns the last error when exhausted, or `abort_error` when aborted.
    pub fn into_result(self, abort_error: E) -> Result<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Exhausted { error, .. } => Err(error),
            Self::Aborted => Err(abort_error),
        }
    }
}

/// Run `operation` until it succeeds, the schedule runs out, or
/// `should_retry` rejects an error.
///
/// `operation` receives the 0-based attempt number.
///
/// # Example
///
/// ```rust,no_run
/// use vigil_core::retry::{RetryConfig, retry};
///
/// # async fn example() {
/// let outcome = retry(&RetryConfig::fast(), |_attempt| async {
///     Ok::<_, String>("flushed")
/// }, |_err| true).await;
/// assert!(outcome.is_success());
/// # }
/// ```
pub async fn retry<T, E, Fut, F, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    retry_with_signal(
        config,
        &AbortSignal::never(),
        |attempt, _signal| operation(attempt),
        should_retry,
    )
    .await
}

/// Like [`retry`], but stops with [`RetryOutcome::Aborted`] as soon as
/// `signal` aborts, including while waiting between attempts.
///
/// Each attempt receives a clone of the signal so it can bound its own work.
pub async fn retry_with_signal<T, E, Fut, F, P>(
    config: &RetryConfig,
    signal: &AbortSignal,
    mut operation: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32, AbortSignal) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        if signal.is_aborted() {
            return RetryOutcome::Aborted;
        }

        let error = match operation(attempt, signal.clone()).await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(error) => error,
        };

        if !config.should_retry(attempt) || !should_retry(&error) {
            return RetryOutcome::Exhausted {
                error,
                attempts: attempt.saturating_add(1),
            };
        }

        attempt = attempt.saturating_add(1);
        let delay = config.next_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "retrying after failure");

        if sleep(delay, Some(signal)).await.is_err() {
            return RetryOutcome::Aborted;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::abort::AbortController;

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig::new(5, Duration::from_millis(50), Duration::from_secs(5), 2.0);
        let delays: Vec<_> = (0..=4).map(|a| config.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::new(
            20,
            Duration::from_millis(100),
            Duration::from_millis(300),
            3.0,
        );
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(300));
        assert_eq!(config.delay_for_attempt(20), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_bounds() {
        let config =
            RetryConfig::new(3, Duration::from_millis(1000), Duration::from_secs(10), 2.0)
                .with_jitter(0.5);
        assert_eq!(config.jittered_delay(1, 0.0), Duration::from_millis(500));
        assert_eq!(config.jittered_delay(1, 1.0), Duration::from_millis(1500));
        assert_eq!(config.jittered_delay(1, 7.0), Duration::from_millis(1500));
    }

    #[test]
    fn test_no_retry_allows_single_attempt() {
        assert!(!RetryConfig::no_retry().should_retry(0));
    }

    #[test]
    fn test_outcome_into_result() {
        let ok: RetryOutcome<u8, &str> = RetryOutcome::Success(1);
        assert_eq!(ok.into_result("aborted"), Ok(1));

        let exhausted: RetryOutcome<u8, &str> = RetryOutcome::Exhausted {
            error: "down",
            attempts: 2,
        };
        assert_eq!(exhausted.into_result("aborted"), Err("down"));

        let aborted: RetryOutcome<u8, &str> = RetryOutcome::Aborted;
        assert!(aborted.is_aborted());
        assert_eq!(aborted.into_result("aborted"), Err("aborted"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_config_section() {
        let section = vigil_config::RetrySection::default();
        let config = RetryConfig::from(&section);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let config = RetryConfig::fast();
        let outcome = retry(
            &config,
            |attempt| async move {
                if attempt < 2 {
                    Err("flaky")
                } else {
                    Ok(attempt)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(outcome, RetryOutcome::Success(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts() {
        let config = RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(4), 2.0);
        let outcome = retry(&config, |_| async { Err::<(), _>("down") }, |_| true).await;
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                error: "down",
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = retry(
            &RetryConfig::fast(),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("invalid") }
            },
            |err| *err != "invalid",
        )
        .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_with_aborted_signal_never_runs() {
        let controller = AbortController::new();
        controller.abort();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome: RetryOutcome<(), ()> = retry_with_signal(
            &RetryConfig::fast(),
            &controller.signal(),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
            |_| true,
        )
        .await;

        assert!(outcome.is_aborted());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_aborts_during_backoff() {
        let config = RetryConfig::new(10, Duration::from_secs(30), Duration::from_secs(30), 1.0);
        let signal = AbortSignal::timeout(Duration::from_secs(1));

        let outcome = retry_with_signal(
            &config,
            &signal,
            |_, _| async { Err::<(), _>("unavailable") },
            |_| true,
        )
        .await;

        assert!(outcome.is_aborted());
    }
}
