//! Per-event listener storage.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::{BusError, BusResult};
use crate::events::{BusEvent, EventName};
use crate::listener::{Listener, ListenerId};

/// One registration. `listener` holds a `Listener<E>` for the event it is
/// filed under.
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) id: ListenerId,
    pub(crate) once: bool,
    pub(crate) name: Arc<str>,
    listener: Arc<dyn Any + Send + Sync>,
}

impl Entry {
    pub(crate) fn listener<E: BusEvent>(&self) -> Option<&Listener<E>> {
        self.listener.downcast_ref()
    }
}

/// Listeners keyed by event name, in registration order.
///
/// Events with no listeners have no key.
pub(crate) struct ListenerRegistry {
    entries: DashMap<EventName, Vec<Entry>>,
    next_id: AtomicU64,
    max_per_event: usize,
}

impl ListenerRegistry {
    pub(crate) fn new(max_per_event: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_event,
        }
    }

    pub(crate) fn max_per_event(&self) -> usize {
        self.max_per_event
    }

    pub(crate) fn add<E: BusEvent>(
        &self,
        listener: &Listener<E>,
        once: bool,
    ) -> BusResult<ListenerId> {
        let mut slot = self.entries.entry(E::NAME).or_default();
        if slot.len() >= self.max_per_event {
            warn!(event = %E::NAME, limit = self.max_per_event, "listener limit reached");
            return Err(BusError::listener_limit(E::NAME, self.max_per_event));
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        slot.push(Entry {
            id,
            once,
            name: Arc::from(listener.name()),
            listener: Arc::new(listener.clone()),
        });
        debug!(event = %E::NAME, listener = listener.name(), %id, once, "listener registered");
        Ok(id)
    }

    /// Remove every registration of `listener`, returning how many there were.
    pub(crate) fn remove<E: BusEvent>(&self, listener: &Listener<E>) -> usize {
        let removed = match self.entries.get_mut(&E::NAME) {
            Some(mut slot) => {
                let before = slot.len();
                slot.retain(|entry| !entry.listener::<E>().is_some_and(|l| l.same_as(listener)));
                before.saturating_sub(slot.len())
            },
            None => 0,
        };
        self.entries.remove_if(&E::NAME, |_, slot| slot.is_empty());
        removed
    }

    /// Remove every listener for `name`.
    pub(crate) fn clear(&self, name: EventName) -> usize {
        self.entries
            .remove(&name)
            .map_or(0, |(_, slot)| slot.len())
    }

    /// Registrations for `name` as they are right now.
    pub(crate) fn snapshot(&self, name: EventName) -> Vec<Entry> {
        self.entries
            .get(&name)
            .map(|slot| slot.value().clone())
            .unwrap_or_default()
    }

    pub(crate) fn contains(&self, name: EventName, id: ListenerId) -> bool {
        self.entries
            .get(&name)
            .is_some_and(|slot| slot.iter().any(|entry| entry.id == id))
    }

    /// Remove a single registration. Returns `false` if another caller
    /// already removed it.
    pub(crate) fn take(&self, name: EventName, id: ListenerId) -> bool {
        let taken = match self.entries.get_mut(&name) {
            Some(mut slot) => match slot.iter().position(|entry| entry.id == id) {
                Some(index) => {
                    slot.remove(index);
                    true
                },
                None => false,
            },
            None => false,
        };
        self.entries.remove_if(&name, |_, slot| slot.is_empty());
        taken
    }

    pub(crate) fn len(&self, name: EventName) -> usize {
        self.entries.get(&name).map_or(0, |slot| slot.len())
    }

    pub(crate) fn counts(&self) -> BTreeMap<EventName, usize> {
        self.entries
            .iter()
            .map(|slot| (*slot.key(), slot.value().len()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_counts", &self.counts())
            .field("max_per_event", &self.max_per_event)
            .finish()
    }
}
