//! The typed event bus.

use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{BusError, BusResult, ListenerError, ListenerFailure};
use crate::events::{BusEvent, EventName};
use crate::listener::Listener;
use crate::metadata::{Envelope, EventMetadata, MetadataInjector};
use crate::middleware::{
    ChainOutcome, Emission, Middleware, MiddlewarePipeline, PayloadSlot, Terminal, run_chain,
};
use crate::panic_message;
use crate::registry::{Entry, ListenerRegistry};

/// Default per-event listener limit.
pub const DEFAULT_MAX_LISTENERS_PER_EVENT: usize = 100;

/// Default middleware limit.
pub const DEFAULT_MAX_MIDDLEWARE: usize = 50;

/// Optional limits for a bus. `None` means the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusOptions {
    /// Maximum number of registered middleware.
    pub max_middleware: Option<usize>,
    /// Maximum listeners per event.
    pub max_listeners_per_event: Option<usize>,
}

/// Callback receiving listener failures.
pub type ListenerErrorHook = Arc<dyn Fn(&ListenerError) + Send + Sync>;

struct BusInner {
    id: String,
    injector: MetadataInjector,
    registry: ListenerRegistry,
    pipeline: MiddlewarePipeline,
    on_listener_error: Option<ListenerErrorHook>,
}

/// A typed publish/subscribe bus with a middleware pipeline.
///
/// Clones share listeners, middleware and the timestamp clock.
///
/// **WARNING:** A listener that captures a clone of the bus it is
/// registered on forms an `Arc` cycle; the bus is then never dropped. Call
/// [`off`](Self::off) for such listeners when shutting down.
///
/// # Example
///
/// ```rust
/// use vigil_events::{EventBus, Listener, SiteRemoved};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = EventBus::new("main")?;
///
/// bus.on(&Listener::<SiteRemoved>::sync(|event| {
///     println!("{} removed ({})", event.site_identifier, event.correlation_id());
///     Ok(())
/// }))?;
///
/// bus.emit(SiteRemoved {
///     site_identifier: "site-1".to_string(),
///     timestamp: 0,
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> BusResult<Self> {
        Self::builder(id).build()
    }

    /// Create a bus with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] if `id` is empty or a limit is
    /// zero.
    pub fn with_options(id: impl Into<String>, options: BusOptions) -> BusResult<Self> {
        Self::builder(id).options(options).build()
    }

    /// Start building a bus.
    pub fn builder(id: impl Into<String>) -> EventBusBuilder {
        EventBusBuilder::new(id)
    }

    /// Create a bus from the `[bus]` section of a loaded config.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] on invalid values.
    #[cfg(feature = "config")]
    pub fn from_config(config: &vigil_config::BusConfig) -> BusResult<Self> {
        Self::builder(config.id.clone())
            .max_middleware(config.max_middleware)
            .max_listeners_per_event(config.max_listeners_per_event)
            .build()
    }

    /// The bus identifier stamped into every emission's metadata.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Subscribe `listener` to its event.
    ///
    /// Registering the same listener twice makes it run twice per emission.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ResourceLimit`] if the event is at its listener
    /// limit.
    pub fn on<E: BusEvent>(&self, listener: &Listener<E>) -> BusResult<&Self> {
        self.inner.registry.add(listener, false)?;
        Ok(self)
    }

    /// Subscribe `listener` for a single delivery.
    ///
    /// The registration is removed before the listener runs, so it is gone
    /// even if the listener fails, and concurrent emissions deliver to it at
    /// most once.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ResourceLimit`] if the event is at its listener
    /// limit.
    pub fn once<E: BusEvent>(&self, listener: &Listener<E>) -> BusResult<&Self> {
        self.inner.registry.add(listener, true)?;
        Ok(self)
    }

    /// Unsubscribe. With `Some(listener)` removes every registration of that
    /// listener; with `None` removes all listeners of `E`.
    ///
    /// Returns how many registrations were removed.
    pub fn off<E: BusEvent>(&self, listener: Option<&Listener<E>>) -> usize {
        let removed = match listener {
            Some(listener) => self.inner.registry.remove(listener),
            None => self.inner.registry.clear(E::NAME),
        };
        if removed > 0 {
            debug!(bus_id = %self.inner.id, event = %E::NAME, removed, "listeners removed");
        }
        removed
    }

    /// Number of listeners registered for `E`.
    #[must_use]
    pub fn listener_count<E: BusEvent>(&self) -> usize {
        self.inner.registry.len(E::NAME)
    }

    /// Append a middleware to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ResourceLimit`] if the pipeline is full.
    pub fn register_middleware(&self, middleware: Arc<dyn Middleware>) -> BusResult<()> {
        self.inner.pipeline.push(middleware)
    }

    /// Remove a middleware by identity. Returns `false` if it was not
    /// registered.
    pub fn remove_middleware(&self, middleware: &Arc<dyn Middleware>) -> bool {
        self.inner.pipeline.remove(middleware)
    }

    /// Remove every middleware.
    pub fn clear_middleware(&self) {
        self.inner.pipeline.clear();
        debug!(bus_id = %self.inner.id, "middleware cleared");
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.inner.pipeline.len()
    }

    /// Snapshot listener counts, limits and middleware usage.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(
            self.inner.id.clone(),
            self.inner.registry.counts(),
            self.inner.registry.max_per_event(),
            self.inner.pipeline.max(),
            self.inner.pipeline.len(),
        )
    }

    /// Emit an event.
    ///
    /// Stamps metadata and runs the middleware pipeline. When the last
    /// middleware calls `next`, each listener is awaited in registration
    /// order before control unwinds back through the middleware. Listener
    /// failures are logged and reported to the error hook but never
    /// returned here.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Middleware`] if a middleware fails. No listener
    /// runs when it fails before calling `next`; when it fails afterwards
    /// the listeners have already been notified.
    pub async fn emit<E: BusEvent>(&self, payload: E) -> BusResult<()> {
        let metadata = self.inner.injector.next();
        let span = debug_span!(
            "emit",
            event = %E::NAME,
            bus_id = %self.inner.id,
            correlation_id = %metadata.correlation_id
        );
        self.dispatch(payload, metadata).instrument(span).await
    }

    async fn dispatch<E: BusEvent>(&self, payload: E, metadata: EventMetadata) -> BusResult<()> {
        let chain = self.inner.pipeline.snapshot();
        let listeners = ListenerDispatch::<E> {
            bus: self,
            entries: self.inner.registry.snapshot(E::NAME),
            event: PhantomData,
        };
        let mut slot = PayloadSlot::Pending(payload);
        let mut emission = Emission::new(&mut slot, &metadata);

        match run_chain(&chain, &mut emission, &listeners).await {
            ChainOutcome::Completed => Ok(()),
            ChainOutcome::Halted => {
                debug!("middleware stopped the emission");
                Ok(())
            },
            ChainOutcome::Failed { middleware, error } => {
                warn!(%middleware, error = %error, "middleware failed, emission aborted");
                Err(BusError::Middleware {
                    event: E::NAME,
                    middleware,
                    source: error,
                })
            },
        }
    }

    /// Deliver to `entries`, the registrations captured when the emission
    /// started.
    async fn notify<E: BusEvent>(&self, entries: &[Entry], envelope: Arc<Envelope<E>>) {
        if entries.is_empty() {
            trace!("no listeners");
            return;
        }

        for entry in entries {
            // Skip registrations removed since the snapshot; claim once
            // registrations so no other emission delivers to them.
            let live = if entry.once {
                self.inner.registry.take(E::NAME, entry.id)
            } else {
                self.inner.registry.contains(E::NAME, entry.id)
            };
            if !live {
                continue;
            }
            let Some(listener) = entry.listener::<E>() else {
                continue;
            };

            trace!(listener = %entry.name, id = %entry.id, "notifying listener");
            if let Err(failure) = invoke(listener, Arc::clone(&envelope)).await {
                self.report(E::NAME, entry, envelope.correlation_id(), failure);
            }
        }
    }

    fn report(
        &self,
        event: EventName,
        entry: &Entry,
        correlation_id: &str,
        failure: ListenerFailure,
    ) {
        let error = ListenerError {
            event,
            listener_id: entry.id,
            listener: entry.name.to_string(),
            correlation_id: correlation_id.to_string(),
            failure,
        };
        warn!(listener = %error.listener, id = %error.listener_id, error = %error.failure, "listener failed");
        if let Some(hook) = &self.inner.on_listener_error {
            hook(&error);
        }
    }
}

/// End of the middleware chain: hands the payload to the listeners of `E`.
struct ListenerDispatch<'b, E> {
    bus: &'b EventBus,
    entries: Vec<Entry>,
    event: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E: BusEvent> Terminal for ListenerDispatch<'_, E> {
    async fn deliver(&self, emission: &mut Emission<'_>) {
        if let Some(envelope) = emission.deliver::<E>() {
            self.bus.notify(&self.entries, envelope).await;
        }
    }
}

async fn invoke<E: BusEvent>(
    listener: &Listener<E>,
    envelope: Arc<Envelope<E>>,
) -> Result<(), ListenerFailure> {
    // Synchronous listeners run inside `call`, so guard it separately from
    // the returned future.
    let future = std::panic::catch_unwind(AssertUnwindSafe(|| listener.call(envelope)))
        .map_err(|panic| ListenerFailure::Panicked(panic_message(&*panic)))?;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(ListenerFailure::Failed(error)),
        Err(panic) => Err(ListenerFailure::Panicked(panic_message(&*panic))),
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.inner.id)
            .field("registry", &self.inner.registry)
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EventBus`].
#[must_use]
pub struct EventBusBuilder {
    id: String,
    options: BusOptions,
    on_listener_error: Option<ListenerErrorHook>,
}

impl EventBusBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: BusOptions::default(),
            on_listener_error: None,
        }
    }

    /// Replace all limits at once.
    pub fn options(mut self, options: BusOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the middleware limit.
    pub fn max_middleware(mut self, max: usize) -> Self {
        self.options.max_middleware = Some(max);
        self
    }

    /// Set the per-event listener limit.
    pub fn max_listeners_per_event(mut self, max: usize) -> Self {
        self.options.max_listeners_per_event = Some(max);
        self
    }

    /// Receive every listener failure.
    pub fn on_listener_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ListenerError) + Send + Sync + 'static,
    {
        self.on_listener_error = Some(Arc::new(hook));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] if the id is empty or a limit is
    /// zero.
    pub fn build(self) -> BusResult<EventBus> {
        if self.id.trim().is_empty() {
            return Err(BusError::configuration("id", "must not be empty"));
        }
        let max_middleware = positive(
            "max_middleware",
            self.options.max_middleware.unwrap_or(DEFAULT_MAX_MIDDLEWARE),
        )?;
        let max_listeners = positive(
            "max_listeners_per_event",
            self.options
                .max_listeners_per_event
                .unwrap_or(DEFAULT_MAX_LISTENERS_PER_EVENT),
        )?;

        debug!(bus_id = %self.id, max_middleware, max_listeners, "event bus created");
        Ok(EventBus {
            inner: Arc::new(BusInner {
                injector: MetadataInjector::new(self.id.clone()),
                registry: ListenerRegistry::new(max_listeners),
                pipeline: MiddlewarePipeline::new(max_middleware),
                on_listener_error: self.on_listener_error,
                id: self.id,
            }),
        })
    }
}

impl fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("on_listener_error", &self.on_listener_error.is_some())
            .finish()
    }
}

fn positive(field: &'static str, value: usize) -> BusResult<usize> {
    if value == 0 {
        return Err(BusError::configuration(field, "must be greater than 0"));
    }
    Ok(value)
}
