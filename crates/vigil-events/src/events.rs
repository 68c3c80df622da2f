//! The closed event taxonomy carried by the bus.
//!
//! Every event name maps to exactly one payload type. The mapping lives in
//! the [`BusEvent`] implementations below and is sealed: no type outside
//! this module can claim an event name, so emitting or subscribing to an
//! unknown name does not compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event name the bus knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventName {
    /// `cache:invalidated`
    #[serde(rename = "cache:invalidated")]
    CacheInvalidated,
    /// `config:changed`
    #[serde(rename = "config:changed")]
    ConfigChanged,
    /// `monitor:status-changed`
    #[serde(rename = "monitor:status-changed")]
    MonitorStatusChanged,
    /// `monitor:check-completed`
    #[serde(rename = "monitor:check-completed")]
    MonitorCheckCompleted,
    /// `site:added`
    #[serde(rename = "site:added")]
    SiteAdded,
    /// `site:removed`
    #[serde(rename = "site:removed")]
    SiteRemoved,
    /// `system:error`
    #[serde(rename = "system:error")]
    SystemError,
}

impl EventName {
    /// All event names, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::CacheInvalidated,
        Self::ConfigChanged,
        Self::MonitorStatusChanged,
        Self::MonitorCheckCompleted,
        Self::SiteAdded,
        Self::SiteRemoved,
        Self::SystemError,
    ];

    /// The wire tag, e.g. `"cache:invalidated"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CacheInvalidated => "cache:invalidated",
            Self::ConfigChanged => "config:changed",
            Self::MonitorStatusChanged => "monitor:status-changed",
            Self::MonitorCheckCompleted => "monitor:check-completed",
            Self::SiteAdded => "site:added",
            Self::SiteRemoved => "site:removed",
            Self::SystemError => "system:error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that is not a known event tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEventName(pub String);

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A payload type bound to one [`EventName`].
///
/// This trait is sealed; the set of events is fixed by this crate.
pub trait BusEvent: sealed::Sealed + Serialize + Send + Sync + 'static {
    /// The event name this payload is emitted under.
    const NAME: EventName;
}

macro_rules! bus_event {
    ($($ty:ty => $name:ident),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl BusEvent for $ty {
                const NAME: EventName = EventName::$name;
            }
        )+
    };
}

bus_event! {
    CacheInvalidated => CacheInvalidated,
    ConfigChanged => ConfigChanged,
    MonitorStatusChanged => MonitorStatusChanged,
    MonitorCheckCompleted => MonitorCheckCompleted,
    SiteAdded => SiteAdded,
    SiteRemoved => SiteRemoved,
    SystemError => SystemError,
}

// ========== Cache ==========

/// What part of the cache was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationScope {
    /// Every cached entry.
    All,
    /// Entries for one monitor.
    Monitor,
    /// Entries for one site.
    Site,
}

/// Why the cache was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationReason {
    /// An operator asked for it.
    Manual,
    /// The underlying record changed.
    Update,
    /// The underlying record was deleted.
    Delete,
    /// The entry outlived its TTL.
    Expiry,
}

/// `cache:invalidated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInvalidated {
    /// Scope of the invalidation.
    #[serde(rename = "type")]
    pub scope: InvalidationScope,
    /// Why it happened.
    pub reason: InvalidationReason,
    /// Monitor or site identifier, absent for [`InvalidationScope::All`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// When the producer observed the change (ms since epoch).
    pub timestamp: i64,
}

// ========== Configuration ==========

/// `config:changed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChanged {
    /// Setting key, e.g. `historyLimit`.
    pub key: String,
    /// Value before the change, if there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value after the change.
    pub new_value: Value,
    /// When the change was made (ms since epoch).
    pub timestamp: i64,
}

// ========== Monitoring ==========

/// Health of a single monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    /// Last check succeeded.
    Up,
    /// Last check failed.
    Down,
    /// No check has completed yet.
    Pending,
    /// Checks are suspended.
    Paused,
}

/// `monitor:status-changed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatusChanged {
    /// Site the monitor belongs to.
    pub site_identifier: String,
    /// Monitor whose status moved.
    pub monitor_id: String,
    /// Status before the transition.
    pub previous_status: MonitorStatus,
    /// Status after the transition.
    pub new_status: MonitorStatus,
    /// When the transition was detected (ms since epoch).
    pub timestamp: i64,
}

/// `monitor:check-completed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorCheckCompleted {
    /// Site the monitor belongs to.
    pub site_identifier: String,
    /// Monitor that was checked.
    pub monitor_id: String,
    /// Result of the check.
    pub status: MonitorStatus,
    /// Round-trip time of the check.
    pub response_time_ms: u64,
    /// When the check finished (ms since epoch).
    pub timestamp: i64,
}

// ========== Sites ==========

/// `site:added`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAdded {
    /// Stable site identifier.
    pub site_identifier: String,
    /// Display name.
    pub name: String,
    /// Number of monitors created with the site.
    pub monitor_count: usize,
    /// When the site was added (ms since epoch).
    pub timestamp: i64,
}

/// `site:removed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRemoved {
    /// Identifier of the removed site.
    pub site_identifier: String,
    /// When the site was removed (ms since epoch).
    pub timestamp: i64,
}

// ========== System ==========

/// `system:error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemError {
    /// Subsystem that failed, e.g. `database`.
    pub context: String,
    /// Human-readable error.
    pub message: String,
    /// Whether the backend kept running.
    pub recoverable: bool,
    /// When the error occurred (ms since epoch).
    pub timestamp: i64,
}
