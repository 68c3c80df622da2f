//! Ready-made middleware.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Emission, Middleware, Next};
use crate::events::{BusEvent, EventName};

/// Logs every emission and how long the rest of the pipeline took,
/// listeners included.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    /// Create the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "tracing"
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        let event = emission.name();
        let correlation_id = emission.correlation_id().to_string();
        debug!(%event, %correlation_id, "emission started");

        let started = Instant::now();
        let result = next.run(emission).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(()) => debug!(%event, %correlation_id, elapsed_ms, "emission finished"),
            Err(e) => warn!(%event, %correlation_id, elapsed_ms, error = %e, "emission failed"),
        }
        result
    }
}

type InspectFn = dyn Fn(&Emission<'_>) -> anyhow::Result<()> + Send + Sync;

/// Runs a synchronous check before passing the emission on.
///
/// An `Err` from the closure aborts the emission.
pub struct InspectMiddleware {
    name: String,
    inspect: Box<InspectFn>,
}

impl InspectMiddleware {
    /// Create a named inspector.
    pub fn new<F>(name: impl Into<String>, inspect: F) -> Self
    where
        F: Fn(&Emission<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inspect: Box::new(inspect),
        }
    }
}

impl fmt::Debug for InspectMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for InspectMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        (self.inspect)(emission)?;
        next.run(emission).await
    }
}

type MapFn<E> = dyn Fn(&mut E) + Send + Sync;

/// Rewrites payloads of one event type in place; other events pass through.
pub struct MapPayload<E: BusEvent> {
    name: String,
    map: Box<MapFn<E>>,
    _event: PhantomData<fn() -> E>,
}

impl<E: BusEvent> MapPayload<E> {
    /// Create a named payload rewriter.
    pub fn new<F>(name: impl Into<String>, map: F) -> Self
    where
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            map: Box::new(map),
            _event: PhantomData,
        }
    }
}

impl<E: BusEvent> fmt::Debug for MapPayload<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapPayload")
            .field("name", &self.name)
            .field("event", &E::NAME)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: BusEvent> Middleware for MapPayload<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        if let Some(payload) = emission.payload_mut::<E>() {
            (self.map)(payload);
        }
        next.run(emission).await
    }
}

/// Rejects emissions of the listed events.
#[derive(Debug, Clone)]
pub struct BlockEvents {
    blocked: HashSet<EventName>,
}

impl BlockEvents {
    /// Block every event in `events`.
    pub fn new(events: impl IntoIterator<Item = EventName>) -> Self {
        Self {
            blocked: events.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Middleware for BlockEvents {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "block-events"
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        let event = emission.name();
        if self.blocked.contains(&event) {
            anyhow::bail!("event '{event}' is blocked");
        }
        next.run(emission).await
    }
}
