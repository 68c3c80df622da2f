//! Test fixtures for event payloads.

use serde_json::Value;

use vigil_events::{
    CacheInvalidated, ConfigChanged, EventMetadata, InvalidationReason, InvalidationScope,
    MonitorStatus, MonitorStatusChanged, SiteAdded, SiteRemoved,
};

/// Fixed producer timestamp used by every fixture.
pub const FIXTURE_TIMESTAMP: i64 = 1_000;

/// A full-cache manual invalidation.
#[must_use]
pub fn test_cache_invalidated() -> CacheInvalidated {
    CacheInvalidated {
        scope: InvalidationScope::All,
        reason: InvalidationReason::Manual,
        identifier: None,
        timestamp: FIXTURE_TIMESTAMP,
    }
}

/// A settings change from `old` to `new`.
#[must_use]
pub fn test_config_changed(key: impl Into<String>, old: Option<Value>, new: Value) -> ConfigChanged {
    ConfigChanged {
        key: key.into(),
        old_value: old,
        new_value: new,
        timestamp: FIXTURE_TIMESTAMP,
    }
}

/// A site with a single monitor.
#[must_use]
pub fn test_site_added(site_identifier: impl Into<String>) -> SiteAdded {
    SiteAdded {
        site_identifier: site_identifier.into(),
        name: "Test Site".to_string(),
        monitor_count: 1,
        timestamp: FIXTURE_TIMESTAMP,
    }
}

/// Removal of a site.
#[must_use]
pub fn test_site_removed(site_identifier: impl Into<String>) -> SiteRemoved {
    SiteRemoved {
        site_identifier: site_identifier.into(),
        timestamp: FIXTURE_TIMESTAMP,
    }
}

/// A monitor going from up to down.
#[must_use]
pub fn test_status_changed(monitor_id: impl Into<String>) -> MonitorStatusChanged {
    MonitorStatusChanged {
        site_identifier: "site-1".to_string(),
        monitor_id: monitor_id.into(),
        previous_status: MonitorStatus::Up,
        new_status: MonitorStatus::Down,
        timestamp: FIXTURE_TIMESTAMP,
    }
}

/// Metadata as a bus named `bus_id` would produce it.
#[must_use]
pub fn test_metadata(bus_id: impl Into<String>) -> EventMetadata {
    EventMetadata {
        correlation_id: "00000000-0000-4000-8000-000000000000".to_string(),
        timestamp: FIXTURE_TIMESTAMP,
        bus_id: bus_id.into(),
    }
}
