//! Recording listeners and scripted middleware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use vigil_events::{BusEvent, Emission, Envelope, Listener, Middleware, Next};

/// A listener that keeps every envelope it receives.
#[derive(Debug)]
pub struct Recorder<E: BusEvent + Clone> {
    seen: Arc<Mutex<Vec<Envelope<E>>>>,
    listener: Listener<E>,
}

impl<E: BusEvent + Clone> Recorder<E> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        let seen: Arc<Mutex<Vec<Envelope<E>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = Listener::sync(move |envelope: &Envelope<E>| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(envelope.clone());
            Ok(())
        })
        .named("recorder");
        Self { seen, listener }
    }

    /// The listener to register on a bus.
    #[must_use]
    pub fn listener(&self) -> &Listener<E> {
        &self.listener
    }

    /// Envelopes received so far, in delivery order.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope<E>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads received so far, in delivery order.
    #[must_use]
    pub fn payloads(&self) -> Vec<E> {
        self.envelopes()
            .into_iter()
            .map(|envelope| envelope.into_parts().0)
            .collect()
    }

    /// Correlation ids received so far.
    #[must_use]
    pub fn correlation_ids(&self) -> Vec<String> {
        self.envelopes()
            .iter()
            .map(|envelope| envelope.correlation_id().to_string())
            .collect()
    }

    /// Number of deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: BusEvent + Clone> Default for Recorder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared, ordered log of labels, for asserting call order across
/// listeners and middleware.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn push(&self, label: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label.into());
    }

    /// All labels so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A listener that appends `label` each time it runs.
    #[must_use]
    pub fn listener<E: BusEvent>(&self, label: &str) -> Listener<E> {
        let log = self.clone();
        let entry = label.to_string();
        Listener::sync(move |_: &Envelope<E>| {
            log.push(entry.clone());
            Ok(())
        })
        .named(label)
    }

    /// A middleware that appends `label:before` and `label:after` around
    /// the rest of the chain.
    #[must_use]
    pub fn middleware(&self, label: &str) -> Arc<dyn Middleware> {
        Arc::new(LoggingStep {
            label: label.to_string(),
            log: self.clone(),
        })
    }
}

struct LoggingStep {
    label: String,
    log: CallLog,
}

#[async_trait]
impl Middleware for LoggingStep {
    fn name(&self) -> &str {
        &self.label
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        self.log.push(format!("{}:before", self.label));
        let result = next.run(emission).await;
        self.log.push(format!("{}:after", self.label));
        result
    }
}

/// Counts emissions and passes them on.
#[derive(Debug, Default)]
pub struct CountingMiddleware {
    count: AtomicUsize,
}

impl CountingMiddleware {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emissions seen so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Middleware for CountingMiddleware {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "counting"
    }

    async fn handle(&self, emission: &mut Emission<'_>, next: Next<'_>) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        next.run(emission).await
    }
}

/// Fails every emission with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingMiddleware {
    message: String,
}

impl FailingMiddleware {
    /// Fail with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Middleware for FailingMiddleware {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, _emission: &mut Emission<'_>, _next: Next<'_>) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Accepts every emission without calling `next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltingMiddleware;

#[async_trait]
impl Middleware for HaltingMiddleware {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "halting"
    }

    async fn handle(&self, _emission: &mut Emission<'_>, _next: Next<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}
