//! Typed listener handles.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::events::BusEvent;
use crate::metadata::Envelope;

/// Future returned by a listener invocation.
pub type ListenerFuture = BoxFuture<'static, anyhow::Result<()>>;

type Callback<E> = dyn Fn(Arc<Envelope<E>>) -> ListenerFuture + Send + Sync;

/// A callback subscribed to one event type.
///
/// Identity is by handle: clones of a `Listener` are the same listener, so
/// keep a clone around to [`off`](crate::EventBus::off) it later. Two
/// listeners built from identical closures are distinct.
pub struct Listener<E: BusEvent> {
    name: Arc<str>,
    callback: Arc<Callback<E>>,
}

impl<E: BusEvent> Listener<E> {
    /// Wrap an async callback.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<Envelope<E>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: Arc::from("anonymous"),
            callback: Arc::new(move |envelope| -> ListenerFuture { Box::pin(callback(envelope)) }),
        }
    }

    /// Wrap a synchronous callback.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(&Envelope<E>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from("anonymous"),
            callback: Arc::new(move |envelope: Arc<Envelope<E>>| -> ListenerFuture {
                let result = callback(&envelope);
                Box::pin(futures::future::ready(result))
            }),
        }
    }

    /// Give the listener a name for logs and error reports.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// The listener's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` is a handle to the same listener.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn call(&self, envelope: Arc<Envelope<E>>) -> ListenerFuture {
        (self.callback)(envelope)
    }
}

impl<E: BusEvent> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E: BusEvent> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("event", &E::NAME)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Identifies one registration of a listener.
///
/// Registering the same listener twice yields two ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SiteRemoved;

    #[test]
    fn test_clone_shares_identity() {
        let a = Listener::<SiteRemoved>::sync(|_| Ok(()));
        let b = a.clone();
        let c = Listener::<SiteRemoved>::sync(|_| Ok(()));

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_named_keeps_identity() {
        let a = Listener::<SiteRemoved>::sync(|_| Ok(()));
        let b = a.clone().named("audit");
        assert!(a.same_as(&b));
        assert_eq!(a.name(), "anonymous");
        assert_eq!(b.name(), "audit");
    }
}
