//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use vigil_events::prelude::*;
//!
//! # async fn example() -> BusResult<()> {
//! let bus = EventBus::new("main")?;
//! bus.on(&Listener::<ConfigChanged>::sync(|event| {
//!     println!("{} changed", event.key);
//!     Ok(())
//! }))?;
//!
//! bus.emit(ConfigChanged {
//!     key: "historyLimit".to_string(),
//!     old_value: None,
//!     new_value: serde_json::json!(500),
//!     timestamp: 0,
//! })
//! .await
//! # }
//! ```

// Event bus
pub use crate::{BusOptions, Diagnostics, EventBus, EventBusBuilder};

// Errors
pub use crate::{BusError, BusResult, ListenerError};

// Events
pub use crate::{
    BusEvent, CacheInvalidated, ConfigChanged, Envelope, EventMetadata, EventName,
    MonitorCheckCompleted, MonitorStatusChanged, SiteAdded, SiteRemoved, SystemError,
};

// Listeners and middleware
pub use crate::{Emission, Listener, Middleware, Next};
