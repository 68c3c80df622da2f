//! Vigil Telemetry - logging setup for the Vigil monitoring backend.
//!
//! The event bus and its collaborators log through `tracing`; this crate
//! installs the subscriber that renders those records.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), vigil_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("vigil_events=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
