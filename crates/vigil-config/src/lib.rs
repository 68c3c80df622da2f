//! Configuration for the Vigil monitoring backend.
//!
//! A single [`Config`] value with `[bus]`, `[logging]` and `[retry]`
//! sections. Every field has a default, so an absent or partial file still
//! produces a complete configuration.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vigil_config::Config;
//!
//! let config = Config::load(Some(std::path::Path::new("vigil.toml"))).unwrap();
//! println!("bus id: {}", config.bus.id);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`VIGIL_BUS_*`, `VIGIL_LOG_*`)
//! 2. **Config file** (when given and present)
//! 3. **Built-in defaults**
//!
//! This crate has no dependencies on other internal vigil crates. Conversion
//! into domain types happens in the consuming crates behind their `config`
//! features.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Configuration error types.
pub mod error;
/// File loading and environment overrides.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load defaults, then `path` if it exists, then `VIGIL_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any source is malformed or the result
    /// fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Load a single file with no overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the TOML is malformed or invalid.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }
}
