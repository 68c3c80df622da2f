//! Emission metadata and the envelope listeners receive.

use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::BusEvent;

/// JSON key under which metadata is attached to a payload.
pub const META_KEY: &str = "_meta";

/// Metadata attached by the bus to every emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Random v4 UUID, unique per emission.
    pub correlation_id: String,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Identifier of the emitting bus.
    pub bus_id: String,
}

/// Stamps emissions with correlation ids and timestamps.
///
/// Timestamps handed out by one injector never go backwards, even if the
/// system clock does.
#[derive(Debug)]
pub(crate) struct MetadataInjector {
    bus_id: String,
    last_timestamp: AtomicI64,
}

impl MetadataInjector {
    pub(crate) fn new(bus_id: impl Into<String>) -> Self {
        Self {
            bus_id: bus_id.into(),
            last_timestamp: AtomicI64::new(i64::MIN),
        }
    }

    pub(crate) fn next(&self) -> EventMetadata {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self.last_timestamp.fetch_max(now, Ordering::AcqRel);
        EventMetadata {
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: previous.max(now),
            bus_id: self.bus_id.clone(),
        }
    }
}

/// A payload together with the metadata of the emission that carried it.
///
/// Serializes as the payload's fields plus a `_meta` object. Derefs to the
/// payload, so listeners can read fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<E> {
    #[serde(flatten)]
    payload: E,
    #[serde(rename = "_meta")]
    metadata: EventMetadata,
}

impl<E> Envelope<E> {
    /// Pair a payload with metadata.
    pub fn new(payload: E, metadata: EventMetadata) -> Self {
        Self { payload, metadata }
    }

    /// The event payload.
    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// The emission metadata.
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Shorthand for `metadata().correlation_id`.
    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    /// Split into payload and metadata.
    pub fn into_parts(self) -> (E, EventMetadata) {
        (self.payload, self.metadata)
    }
}

impl<E: BusEvent> Envelope<E> {
    /// Render the envelope as JSON, the shape forwarded to renderer clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl<E> Deref for Envelope<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::events::{CacheInvalidated, InvalidationReason, InvalidationScope};

    #[test]
    fn test_correlation_ids_are_unique_v4() {
        let injector = MetadataInjector::new("bus");
        let ids: HashSet<String> = (0..1000).map(|_| injector.next().correlation_id).collect();
        assert_eq!(ids.len(), 1000);

        let parsed = Uuid::parse_str(ids.iter().next().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_timestamps_do_not_go_backwards() {
        let injector = MetadataInjector::new("bus");
        let mut last = i64::MIN;
        for _ in 0..500 {
            let meta = injector.next();
            assert!(meta.timestamp >= last);
            last = meta.timestamp;
        }
    }

    #[test]
    fn test_injector_clamps_to_last_timestamp() {
        let injector = MetadataInjector::new("bus");
        let future = chrono::Utc::now().timestamp_millis().saturating_add(60_000);
        injector.last_timestamp.store(future, Ordering::SeqCst);
        assert_eq!(injector.next().timestamp, future);
    }

    #[test]
    fn test_envelope_serializes_meta_alongside_payload() {
        let envelope = Envelope::new(
            CacheInvalidated {
                scope: InvalidationScope::Site,
                reason: InvalidationReason::Update,
                identifier: Some("site-1".to_string()),
                timestamp: 42,
            },
            EventMetadata {
                correlation_id: "c-1".to_string(),
                timestamp: 43,
                bus_id: "main".to_string(),
            },
        );

        assert_eq!(envelope.identifier.as_deref(), Some("site-1"));
        assert_eq!(
            envelope.to_json().unwrap(),
            serde_json::json!({
                "type": "site",
                "reason": "update",
                "identifier": "site-1",
                "timestamp": 42,
                "_meta": {"correlationId": "c-1", "timestamp": 43, "busId": "main"}
            })
        );
    }
}
