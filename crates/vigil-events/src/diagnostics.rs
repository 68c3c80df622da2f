//! Point-in-time view of a bus.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::events::EventName;

/// Snapshot returned by [`EventBus::diagnostics`](crate::EventBus::diagnostics).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Identifier of the bus.
    pub bus_id: String,
    /// Listener count per event. Events without listeners are omitted.
    pub listener_counts: BTreeMap<EventName, usize>,
    /// Per-event listener limit.
    pub max_listeners: usize,
    /// Middleware limit.
    pub max_middleware: usize,
    /// Registered middleware.
    pub middleware_count: usize,
    /// `middleware_count / max_middleware`, in `0.0..=1.0`.
    pub middleware_utilization: f64,
}

impl Diagnostics {
    pub(crate) fn new(
        bus_id: String,
        listener_counts: BTreeMap<EventName, usize>,
        max_listeners: usize,
        max_middleware: usize,
        middleware_count: usize,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let middleware_utilization = if max_middleware == 0 {
            0.0
        } else {
            middleware_count as f64 / max_middleware as f64
        };

        Self {
            bus_id,
            listener_counts,
            max_listeners,
            max_middleware,
            middleware_count,
            middleware_utilization,
        }
    }

    /// Listener count for `event`, zero if it has none.
    #[must_use]
    pub fn listener_count(&self, event: EventName) -> usize {
        self.listener_counts.get(&event).copied().unwrap_or(0)
    }

    /// Listener count across all events.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listener_counts.values().copied().fold(0, usize::saturating_add)
    }
}
