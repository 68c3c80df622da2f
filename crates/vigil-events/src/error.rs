//! Error types for the event bus.

use thiserror::Error;

use crate::events::EventName;
use crate::listener::ListenerId;

/// Errors returned by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus was constructed with invalid options.
    #[error("invalid bus option '{field}': {message}")]
    Configuration {
        /// Option that failed validation.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A listener or middleware limit was reached.
    #[error("{message}")]
    ResourceLimit {
        /// Which limit was hit.
        resource: LimitedResource,
        /// The configured limit.
        limit: usize,
        /// Human-readable description.
        message: String,
    },

    /// A middleware failed, so no listener was notified.
    ///
    /// Displays exactly as the underlying middleware error.
    #[error("{source}")]
    Middleware {
        /// Event being emitted.
        event: EventName,
        /// Name of the middleware that raised the error.
        middleware: String,
        /// The middleware's error.
        #[source]
        source: anyhow::Error,
    },
}

/// The resource a [`BusError::ResourceLimit`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedResource {
    /// The middleware pipeline.
    Middleware,
    /// Listeners registered for one event.
    Listeners(EventName),
}

impl BusError {
    pub(crate) fn configuration(field: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn middleware_limit(limit: usize) -> Self {
        Self::ResourceLimit {
            resource: LimitedResource::Middleware,
            limit,
            message: format!("Maximum middleware limit ({limit}) reached"),
        }
    }

    pub(crate) fn listener_limit(event: EventName, limit: usize) -> Self {
        Self::ResourceLimit {
            resource: LimitedResource::Listeners(event),
            limit,
            message: format!("Maximum listener limit ({limit}) reached for event '{event}'"),
        }
    }
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// A listener failed while handling an emission.
///
/// Listener failures never reach the emitter; they are logged and handed to
/// the hook installed with
/// [`EventBusBuilder::on_listener_error`](crate::EventBusBuilder::on_listener_error).
#[derive(Debug, Error)]
#[error("listener '{listener}' ({listener_id}) failed on '{event}': {failure}")]
pub struct ListenerError {
    /// Event being dispatched.
    pub event: EventName,
    /// Registration that failed.
    pub listener_id: ListenerId,
    /// Listener name, `anonymous` unless set.
    pub listener: String,
    /// Correlation id of the emission.
    pub correlation_id: String,
    /// What went wrong.
    pub failure: ListenerFailure,
}

/// How a listener failed.
#[derive(Debug, Error)]
pub enum ListenerFailure {
    /// The listener returned an error.
    #[error("{0}")]
    Failed(anyhow::Error),
    /// The listener panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}
