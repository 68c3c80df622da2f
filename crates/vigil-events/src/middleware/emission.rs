//! Type-erased view of an in-flight emission.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::events::{BusEvent, EventName};
use crate::metadata::{Envelope, EventMetadata, META_KEY};

/// Owns the payload while middleware run. At the end of the chain the
/// payload moves into the envelope handed to listeners; outer middleware
/// can still read it from there once `next` returns.
pub(crate) enum PayloadSlot<E> {
    Pending(E),
    Delivered(Arc<Envelope<E>>),
    Empty,
}

impl<E: BusEvent> PayloadSlot<E> {
    fn get(&self) -> Option<&E> {
        match self {
            Self::Pending(payload) => Some(payload),
            Self::Delivered(envelope) => Some(envelope.payload()),
            Self::Empty => None,
        }
    }
}

trait ErasedPayload: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn to_json(&self) -> serde_json::Result<Value>;
}

impl<E: BusEvent> ErasedPayload for PayloadSlot<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        match self.get() {
            Some(payload) => serde_json::to_value(payload),
            None => Ok(Value::Null),
        }
    }
}

/// An emission as seen by middleware.
///
/// Middleware can inspect the event name and metadata of any emission and
/// borrow the payload as its concrete type to read or modify it. Listeners
/// receive whatever the payload looks like after the last middleware ran.
///
/// Once `next.run` has returned, the payload belongs to the listeners:
/// [`payload`](Self::payload) still reads it but
/// [`payload_mut`](Self::payload_mut) returns `None`.
pub struct Emission<'a> {
    name: EventName,
    metadata: &'a EventMetadata,
    payload: &'a mut dyn ErasedPayload,
}

impl<'a> Emission<'a> {
    pub(crate) fn new<E: BusEvent>(
        payload: &'a mut PayloadSlot<E>,
        metadata: &'a EventMetadata,
    ) -> Self {
        Self {
            name: E::NAME,
            metadata,
            payload,
        }
    }

    /// Name of the event being emitted.
    #[must_use]
    pub fn name(&self) -> EventName {
        self.name
    }

    /// Metadata stamped on this emission.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        self.metadata
    }

    /// Shorthand for `metadata().correlation_id`.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    /// Whether the payload is an `E`.
    #[must_use]
    pub fn is<E: BusEvent>(&self) -> bool {
        self.name == E::NAME
    }

    /// Borrow the payload as `E`, or `None` for any other event.
    #[must_use]
    pub fn payload<E: BusEvent>(&self) -> Option<&E> {
        self.payload
            .as_any()
            .downcast_ref::<PayloadSlot<E>>()
            .and_then(PayloadSlot::get)
    }

    /// Mutably borrow the payload as `E`, or `None` for any other event or
    /// once listeners have been notified.
    pub fn payload_mut<E: BusEvent>(&mut self) -> Option<&mut E> {
        match self.payload.as_any_mut().downcast_mut::<PayloadSlot<E>>() {
            Some(PayloadSlot::Pending(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Move the payload into a listener envelope. `None` if it was already
    /// delivered or `E` is not the emitted type.
    pub(crate) fn deliver<E: BusEvent>(&mut self) -> Option<Arc<Envelope<E>>> {
        let metadata = self.metadata.clone();
        let slot = self.payload.as_any_mut().downcast_mut::<PayloadSlot<E>>()?;
        match std::mem::replace(slot, PayloadSlot::Empty) {
            PayloadSlot::Pending(payload) => {
                let envelope = Arc::new(Envelope::new(payload, metadata));
                *slot = PayloadSlot::Delivered(Arc::clone(&envelope));
                Some(envelope)
            },
            other => {
                *slot = other;
                None
            },
        }
    }

    /// Render the payload with its `_meta` object attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        let mut value = self.payload.to_json()?;
        if let Value::Object(map) = &mut value {
            map.insert(META_KEY.to_string(), serde_json::to_value(self.metadata)?);
        }
        Ok(value)
    }
}

impl fmt::Debug for Emission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emission")
            .field("name", &self.name)
            .field("metadata", self.metadata)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConfigChanged, SiteRemoved};

    fn metadata() -> EventMetadata {
        EventMetadata {
            correlation_id: "corr".to_string(),
            timestamp: 7,
            bus_id: "test".to_string(),
        }
    }

    #[test]
    fn test_payload_downcasts_to_emitted_type_only() {
        let meta = metadata();
        let mut slot = PayloadSlot::Pending(SiteRemoved {
            site_identifier: "s".to_string(),
            timestamp: 1,
        });
        let emission = Emission::new(&mut slot, &meta);

        assert_eq!(emission.name(), EventName::SiteRemoved);
        assert!(emission.is::<SiteRemoved>());
        assert!(emission.payload::<SiteRemoved>().is_some());
        assert!(emission.payload::<ConfigChanged>().is_none());
    }

    #[test]
    fn test_payload_mut_writes_through() {
        let meta = metadata();
        let mut slot = PayloadSlot::Pending(SiteRemoved {
            site_identifier: "before".to_string(),
            timestamp: 1,
        });

        let mut emission = Emission::new(&mut slot, &meta);
        emission.payload_mut::<SiteRemoved>().unwrap().site_identifier = "after".to_string();

        assert_eq!(emission.payload::<SiteRemoved>().unwrap().site_identifier, "after");
    }

    #[test]
    fn test_deliver_moves_payload_into_envelope_once() {
        let meta = metadata();
        let mut slot = PayloadSlot::Pending(SiteRemoved {
            site_identifier: "s".to_string(),
            timestamp: 1,
        });
        let mut emission = Emission::new(&mut slot, &meta);

        assert!(emission.deliver::<ConfigChanged>().is_none());
        let envelope = emission.deliver::<SiteRemoved>().unwrap();
        assert_eq!(envelope.metadata().bus_id, "test");
        assert!(emission.deliver::<SiteRemoved>().is_none());

        assert_eq!(emission.payload::<SiteRemoved>().unwrap().site_identifier, "s");
        assert!(emission.payload_mut::<SiteRemoved>().is_none());
        assert_eq!(emission.to_json().unwrap()["_meta"]["correlationId"], "corr");
    }

    #[test]
    fn test_to_json_attaches_meta() {
        let meta = metadata();
        let mut slot = PayloadSlot::Pending(SiteRemoved {
            site_identifier: "s".to_string(),
            timestamp: 1,
        });
        let json = Emission::new(&mut slot, &meta).to_json().unwrap();

        assert_eq!(json["siteIdentifier"], "s");
        assert_eq!(json["_meta"]["correlationId"], "corr");
        assert_eq!(json["_meta"]["busId"], "test");
    }
}
