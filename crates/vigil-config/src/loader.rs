//! Config file loading and environment overrides.
//!
//! [`load`] resolves configuration in three steps:
//! 1. Built-in defaults
//! 2. An optional TOML file (skipped when it does not exist)
//! 3. `VIGIL_*` environment variables
//!
//! The result is validated before it is returned.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Maximum accepted config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variable overriding `bus.id`.
pub const ENV_BUS_ID: &str = "VIGIL_BUS_ID";
/// Environment variable overriding `bus.max_middleware`.
pub const ENV_BUS_MAX_MIDDLEWARE: &str = "VIGIL_BUS_MAX_MIDDLEWARE";
/// Environment variable overriding `bus.max_listeners_per_event`.
pub const ENV_BUS_MAX_LISTENERS: &str = "VIGIL_BUS_MAX_LISTENERS_PER_EVENT";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "VIGIL_LOG_LEVEL";
/// Environment variable overriding `logging.format`.
pub const ENV_LOG_FORMAT: &str = "VIGIL_LOG_FORMAT";

/// Load configuration from defaults, an optional file, and the process
/// environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file exists but cannot be read or
/// parsed, an environment override is malformed, or the result fails
/// validation.
pub fn load(path: Option<&Path>) -> ConfigResult<Config> {
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    load_with_env(path, &env_vars)
}

/// [`load`] with an explicit environment map.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(path: Option<&Path>, env_vars: &HashMap<String, String>) -> ConfigResult<Config> {
    let mut config = match path {
        Some(path) => match try_read_file(path)? {
            Some(content) => {
                let config = parse(&content, &path.display().to_string())?;
                info!(path = %path.display(), "loaded config file");
                config
            },
            None => Config::default(),
        },
        None => Config::default(),
    };

    let applied = apply_env_overrides(&mut config, env_vars)?;
    if applied > 0 {
        debug!(count = applied, "applied environment overrides");
    }

    validate::validate(&config)?;
    Ok(config)
}

/// Load a single file with no environment overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, oversized, malformed,
/// or invalid.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = try_read_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;

    let config = parse(&content, &path.display().to_string())?;
    validate::validate(&config)?;
    Ok(config)
}

/// Parse and validate configuration from a TOML string.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the TOML is malformed or invalid.
pub fn from_toml_str(content: &str) -> ConfigResult<Config> {
    let config = parse(content, "<inline>")?;
    validate::validate(&config)?;
    Ok(config)
}

fn parse(content: &str, origin: &str) -> ConfigResult<Config> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })
}

/// Read a file, returning `None` if it does not exist.
///
/// The size cap is checked on the file metadata before anything is read.
fn try_read_file(path: &Path) -> ConfigResult<Option<String>> {
    let read_error = |e: std::io::Error| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    };

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(None);
        },
        Err(e) => return Err(read_error(e)),
    };
    check_size(path, metadata.len())?;

    std::fs::read_to_string(path).map(Some).map_err(read_error)
}

fn check_size(path: &Path, len: u64) -> ConfigResult<()> {
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }
    Ok(())
}

/// Apply `VIGIL_*` overrides. Returns how many were applied.
fn apply_env_overrides(
    config: &mut Config,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied: usize = 0;

    if let Some(id) = env_vars.get(ENV_BUS_ID) {
        config.bus.id.clone_from(id);
        applied = applied.saturating_add(1);
    }
    if let Some(raw) = env_vars.get(ENV_BUS_MAX_MIDDLEWARE) {
        config.bus.max_middleware = parse_env(ENV_BUS_MAX_MIDDLEWARE, raw)?;
        applied = applied.saturating_add(1);
    }
    if let Some(raw) = env_vars.get(ENV_BUS_MAX_LISTENERS) {
        config.bus.max_listeners_per_event = parse_env(ENV_BUS_MAX_LISTENERS, raw)?;
        applied = applied.saturating_add(1);
    }
    if let Some(level) = env_vars.get(ENV_LOG_LEVEL) {
        config.logging.level.clone_from(level);
        applied = applied.saturating_add(1);
    }
    if let Some(format) = env_vars.get(ENV_LOG_FORMAT) {
        config.logging.format = format.to_lowercase();
        applied = applied.saturating_add(1);
    }

    Ok(applied)
}

fn parse_env<T>(var_name: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::EnvError {
        var_name: var_name.to_owned(),
        message: format!("invalid value '{raw}': {e}"),
    })
}
