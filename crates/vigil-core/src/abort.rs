//! Abort signals for cooperative cancellation.
//!
//! An [`AbortController`] owns the right to cancel; the [`AbortSignal`]s it
//! hands out only observe. Signals can be combined with [`AbortSignal::any`]
//! and bounded in time with [`AbortSignal::timeout`], so a caller can hand a
//! single signal to long-running work that should stop on whichever
//! condition happens first.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use vigil_core::abort::{AbortController, AbortSignal, sleep};
//!
//! # async fn example() {
//! let shutdown = AbortController::new();
//! let signal = AbortSignal::any([shutdown.signal(), AbortSignal::timeout(Duration::from_secs(5))]);
//!
//! shutdown.abort();
//! assert!(sleep(Duration::from_secs(60), Some(&signal)).await.is_err());
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::select_all;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Why a signal aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The owning controller called [`AbortController::abort`].
    Cancelled,
    /// A timeout-derived signal reached its deadline.
    TimedOut(Duration),
    /// The controller aborted with a caller-supplied reason.
    Other(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Error returned by operations that were cut short by an abort signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation aborted: {0}")]
pub struct Aborted(pub AbortReason);

impl Aborted {
    /// The reason carried by the signal that fired.
    #[must_use]
    pub fn reason(&self) -> &AbortReason {
        &self.0
    }
}

/// Owner side of a cancellable operation.
///
/// Cloning the controller shares the same underlying token.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
}

impl AbortController {
    /// Create a controller that has not been aborted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort with [`AbortReason::Cancelled`].
    pub fn abort(&self) {
        self.abort_with(AbortReason::Cancelled);
    }

    /// Abort with an explicit reason.
    ///
    /// Only the first reason sticks; later calls are no-ops.
    pub fn abort_with(&self, reason: AbortReason) {
        // Reason must be visible before the token wakes any waiter.
        if self.reason.set(reason).is_ok() {
            trace!("abort controller fired");
        }
        self.token.cancel();
    }

    /// Whether this controller has aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A signal observing this controller.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            sources: vec![Source::Token {
                token: self.token.clone(),
                reason: Arc::clone(&self.reason),
            }],
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Token {
        token: CancellationToken,
        reason: Arc<OnceLock<AbortReason>>,
    },
    Deadline {
        at: Instant,
        after: Duration,
    },
}

impl Source {
    fn reason(&self) -> Option<AbortReason> {
        match self {
            Self::Token { token, reason } => token
                .is_cancelled()
                .then(|| reason.get().cloned().unwrap_or(AbortReason::Cancelled)),
            Self::Deadline { at, after } => {
                (Instant::now() >= *at).then_some(AbortReason::TimedOut(*after))
            },
        }
    }

    async fn fired(&self) -> AbortReason {
        match self {
            Self::Token { token, reason } => {
                token.cancelled().await;
                reason.get().cloned().unwrap_or(AbortReason::Cancelled)
            },
            Self::Deadline { at, after } => {
                tokio::time::sleep_until(*at).await;
                AbortReason::TimedOut(*after)
            },
        }
    }
}

/// Observer side of a cancellable operation.
///
/// A signal is a set of sources; it is aborted as soon as any one of them
/// is. An empty signal never aborts.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    sources: Vec<Source>,
}

impl AbortSignal {
    /// A signal that never aborts.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// A signal that is already aborted with the given reason.
    #[must_use]
    pub fn aborted_with(reason: AbortReason) -> Self {
        let controller = AbortController::new();
        controller.abort_with(reason);
        controller.signal()
    }

    /// A signal that aborts once `after` has elapsed.
    ///
    /// A duration too large to represent as a deadline yields a signal that
    /// never fires.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        match Instant::now().checked_add(after) {
            Some(at) => Self {
                sources: vec![Source::Deadline { at, after }],
            },
            None => Self::never(),
        }
    }

    /// Combine signals; the result aborts when any input aborts.
    #[must_use]
    pub fn any(signals: impl IntoIterator<Item = AbortSignal>) -> Self {
        Self {
            sources: signals.into_iter().flat_map(|s| s.sources).collect(),
        }
    }

    /// Whether any source has aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.sources.iter().any(|s| s.reason().is_some())
    }

    /// The reason of the first source, in combination order, that has
    /// aborted.
    #[must_use]
    pub fn reason(&self) -> Option<AbortReason> {
        self.sources.iter().find_map(Source::reason)
    }

    /// Return `Err` if the signal has already aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Aborted`] carrying the abort reason.
    pub fn check(&self) -> Result<(), Aborted> {
        match self.reason() {
            Some(reason) => Err(Aborted(reason)),
            None => Ok(()),
        }
    }

    /// Wait until the signal aborts and return the reason.
    ///
    /// Pends forever for a signal with no sources.
    pub async fn aborted(&self) -> AbortReason {
        if let Some(reason) = self.reason() {
            return reason;
        }
        if self.sources.is_empty() {
            return std::future::pending().await;
        }

        let waiters = self.sources.iter().map(|s| Box::pin(s.fired()));
        let (reason, _, _) = select_all(waiters).await;
        reason
    }
}

/// Sleep for `duration`, returning early with [`Aborted`] if `signal` fires.
///
/// An already-aborted signal fails immediately without sleeping.
///
/// # Errors
///
/// Returns [`Aborted`] when the signal aborts before the duration elapses.
pub async fn sleep(duration: Duration, signal: Option<&AbortSignal>) -> Result<(), Aborted> {
    let Some(signal) = signal else {
        tokio::time::sleep(duration).await;
        return Ok(());
    };

    signal.check()?;

    tokio::select! {
        biased;
        reason = signal.aborted() => Err(Aborted(reason)),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
