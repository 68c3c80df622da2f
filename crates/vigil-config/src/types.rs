//! Configuration struct definitions.
//!
//! Every section has serde defaults so a partial file (or none at all)
//! yields a complete, valid [`Config`].

use serde::{Deserialize, Serialize};

/// Default bus identifier.
pub const DEFAULT_BUS_ID: &str = "vigil";
/// Default cap on registered middleware.
pub const DEFAULT_MAX_MIDDLEWARE: usize = 50;
/// Default cap on listeners per event name.
pub const DEFAULT_MAX_LISTENERS_PER_EVENT: usize = 100;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus limits and identity.
    pub bus: BusConfig,
    /// Logging setup.
    pub logging: LoggingConfig,
    /// Default retry schedule for producers.
    pub retry: RetrySection,
}

/// `[bus]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Identifier stamped into every emission's metadata.
    pub id: String,
    /// Maximum number of middleware in the pipeline.
    pub max_middleware: usize,
    /// Maximum number of listeners for a single event name.
    pub max_listeners_per_event: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_BUS_ID.to_owned(),
            max_middleware: DEFAULT_MAX_MIDDLEWARE,
            max_listeners_per_event: DEFAULT_MAX_LISTENERS_PER_EVENT,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Extra filter directives such as `vigil_events=trace`.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between delays.
    pub exponential_base: f64,
    /// Relative jitter in `0.0..=1.0`.
    pub jitter_factor: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
        }
    }
}
