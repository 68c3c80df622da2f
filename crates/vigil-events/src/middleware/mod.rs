//! Middleware pipeline.
//!
//! Every emission passes through the registered middleware in registration
//! order before any listener runs. Each middleware receives the
//! [`Emission`] and a [`Next`] continuation:
//!
//! - awaiting `next.run(emission)` hands control to the rest of the chain;
//!   the last middleware's `next` notifies the listeners, so code after
//!   the await runs once every listener has finished;
//! - returning `Ok(())` without calling `next` stops the emission quietly;
//! - returning `Err` (or panicking) stops the emission and the error is
//!   returned from [`EventBus::emit`](crate::EventBus::emit).
//!
//! A middleware that fails after its `next` returned still fails `emit`,
//! but the listeners have already run by then.
//!
//! ```rust
//! use async_trait::async_trait;
//! use vigil_events::{Emission, Middleware, Next};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Middleware for Audit {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
//!         println!("emitting {}", emission.name());
//!         next.run(emission).await
//!     }
//! }
//! ```

mod builtin;
mod emission;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, trace, warn};

pub use builtin::{BlockEvents, InspectMiddleware, MapPayload, TracingMiddleware};
pub use emission::Emission;
pub(crate) use emission::PayloadSlot;

use crate::error::{BusError, BusResult};
use crate::panic_message;

/// A step in the emission pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and in [`BusError::Middleware`].
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Process an emission. Call `next.run(emission).await` to continue.
    ///
    /// # Errors
    ///
    /// Any error aborts the emission and is returned to the emitter.
    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()>;
}

/// What runs once the whole chain has called `next`.
#[async_trait]
pub(crate) trait Terminal: Send + Sync {
    async fn deliver(&self, emission: &mut Emission<'_>);
}

#[derive(Debug, Default)]
struct ChainState {
    reached_end: AtomicBool,
    failed_at: OnceLock<String>,
}

/// Continuation handed to each middleware.
///
/// Consumed by [`run`](Next::run), so the rest of the chain runs at most
/// once per middleware invocation.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    state: &'a ChainState,
    terminal: &'a dyn Terminal,
}

impl Next<'_> {
    /// Run the remaining middleware, then notify the listeners.
    ///
    /// Listener failures are reported by the bus and never surface here.
    ///
    /// # Errors
    ///
    /// Returns the first error raised further down the chain.
    pub async fn run(self, emission: &mut Emission<'_>) -> anyhow::Result<()> {
        let Some((head, rest)) = self.chain.split_first() else {
            self.state.reached_end.store(true, Ordering::Release);
            self.terminal.deliver(emission).await;
            return Ok(());
        };

        let next = Next {
            chain: rest,
            state: self.state,
            terminal: self.terminal,
        };
        trace!(middleware = head.name(), event = %emission.name(), "entering middleware");

        let result = match AssertUnwindSafe(head.handle(emission, next))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!(
                "middleware '{}' panicked: {}",
                head.name(),
                panic_message(&*panic)
            )),
        };

        if result.is_err() {
            // Innermost failure wins; outer middleware only propagate it.
            let _ = self.state.failed_at.set(head.name().to_string());
        }
        result
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .finish()
    }
}

/// How a pass through the pipeline ended.
#[derive(Debug)]
pub(crate) enum ChainOutcome {
    /// Every middleware called `next` and the listeners ran.
    Completed,
    /// Some middleware returned without calling `next`.
    Halted,
    /// A middleware failed.
    Failed {
        middleware: String,
        error: anyhow::Error,
    },
}

/// Ordered, bounded list of middleware.
pub(crate) struct MiddlewarePipeline {
    chain: RwLock<Vec<Arc<dyn Middleware>>>,
    max: usize,
}

impl MiddlewarePipeline {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            chain: RwLock::new(Vec::new()),
            max,
        }
    }

    pub(crate) fn max(&self) -> usize {
        self.max
    }

    pub(crate) fn push(&self, middleware: Arc<dyn Middleware>) -> BusResult<()> {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        if chain.len() >= self.max {
            warn!(middleware = middleware.name(), limit = self.max, "middleware limit reached");
            return Err(BusError::middleware_limit(self.max));
        }
        debug!(middleware = middleware.name(), position = chain.len(), "middleware registered");
        chain.push(middleware);
        Ok(())
    }

    /// Remove the first registration of `middleware`, by identity.
    pub(crate) fn remove(&self, middleware: &Arc<dyn Middleware>) -> bool {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        match chain.iter().position(|m| Arc::ptr_eq(m, middleware)) {
            Some(index) => {
                chain.remove(index);
                debug!(middleware = middleware.name(), "middleware removed");
                true
            },
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The chain as it is right now. Later registrations do not affect a
    /// pass already started from this snapshot.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Middleware>> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("len", &self.len())
            .field("max", &self.max)
            .finish()
    }
}

/// Drive `emission` through `chain`, ending in `terminal`.
pub(crate) async fn run_chain(
    chain: &[Arc<dyn Middleware>],
    emission: &mut Emission<'_>,
    terminal: &dyn Terminal,
) -> ChainOutcome {
    let state = ChainState::default();
    let next = Next {
        chain,
        state: &state,
        terminal,
    };

    match next.run(emission).await {
        Ok(()) if state.reached_end.load(Ordering::Acquire) => ChainOutcome::Completed,
        Ok(()) => ChainOutcome::Halted,
        Err(error) => ChainOutcome::Failed {
            middleware: state
                .failed_at
                .get()
                .cloned()
                .unwrap_or_else(|| "anonymous".to_string()),
            error,
        },
    }
}
