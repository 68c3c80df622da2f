//! Vigil Events - Typed event bus for the Vigil monitoring backend.
//!
//! This crate provides:
//! - A closed taxonomy of events, each bound to one payload type
//! - Metadata injection (correlation id, timestamp, bus id) on every emission
//! - An ordered middleware pipeline that can inspect, rewrite or reject
//!   emissions before listeners run
//! - Listener isolation: a failing or panicking listener never affects the
//!   emitter or the other listeners
//!
//! # Architecture
//!
//! An emission flows through three stages:
//!
//! 1. **Metadata**: the bus stamps a fresh [`EventMetadata`].
//! 2. **Middleware**: each [`Middleware`] runs in registration order and
//!    decides whether to continue with [`Next::run`].
//! 3. **Listeners**: every [`Listener`] registered for the event receives an
//!    [`Envelope`] with the (possibly rewritten) payload and its metadata,
//!    sequentially in registration order.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_events::{
//!     CacheInvalidated, EventBus, InvalidationReason, InvalidationScope, Listener,
//!     TracingMiddleware,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = EventBus::new("main")?;
//! bus.register_middleware(Arc::new(TracingMiddleware::new()))?;
//!
//! let listener = Listener::<CacheInvalidated>::new(|event| async move {
//!     assert_eq!(event.metadata().bus_id, "main");
//!     Ok(())
//! });
//! bus.on(&listener)?;
//!
//! bus.emit(CacheInvalidated {
//!     scope: InvalidationScope::All,
//!     reason: InvalidationReason::Manual,
//!     identifier: None,
//!     timestamp: 1000,
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod diagnostics;
mod error;
mod events;
mod listener;
mod metadata;
mod middleware;
mod registry;

pub use bus::{
    BusOptions, DEFAULT_MAX_LISTENERS_PER_EVENT, DEFAULT_MAX_MIDDLEWARE, EventBus, EventBusBuilder,
    ListenerErrorHook,
};
pub use diagnostics::Diagnostics;
pub use error::{BusError, BusResult, LimitedResource, ListenerError, ListenerFailure};
pub use events::{
    BusEvent, CacheInvalidated, ConfigChanged, EventName, InvalidationReason, InvalidationScope,
    MonitorCheckCompleted, MonitorStatus, MonitorStatusChanged, SiteAdded, SiteRemoved,
    SystemError, UnknownEventName,
};
pub use listener::{Listener, ListenerFuture, ListenerId};
pub use metadata::{Envelope, EventMetadata, META_KEY};
pub use middleware::{
    BlockEvents, Emission, InspectMiddleware, MapPayload, Middleware, Next, TracingMiddleware,
};

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
