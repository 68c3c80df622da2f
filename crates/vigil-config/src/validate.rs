//! Post-load configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Accepted `logging.format` values.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(config)?;
    validate_retry(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_bus(config: &Config) -> ConfigResult<()> {
    let bus = &config.bus;

    if bus.id.trim().is_empty() {
        return Err(invalid("bus.id", "bus id must not be empty"));
    }
    if bus.max_middleware == 0 {
        return Err(invalid("bus.max_middleware", "must be greater than 0"));
    }
    if bus.max_listeners_per_event == 0 {
        return Err(invalid(
            "bus.max_listeners_per_event",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let logging = &config.logging;

    if logging.level.trim().is_empty() {
        return Err(invalid("logging.level", "log level must not be empty"));
    }
    if !LOG_FORMATS.contains(&logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_retry(config: &Config) -> ConfigResult<()> {
    let retry = &config.retry;

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(invalid(
            "retry.max_delay_ms",
            "max_delay_ms must be at least initial_delay_ms",
        ));
    }
    if !retry.exponential_base.is_finite() || retry.exponential_base < 1.0 {
        return Err(invalid(
            "retry.exponential_base",
            "exponential_base must be a finite number >= 1.0",
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(invalid(
            "retry.jitter_factor",
            "jitter_factor must be between 0.0 and 1.0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = Config::default();
        config.bus.max_middleware = 0;
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "bus.max_middleware"
        ));

        let mut config = Config::default();
        config.bus.max_listeners_per_event = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_bus_id_rejected() {
        let mut config = Config::default();
        config.bus.id = "   ".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported format 'xml'"));
    }

    #[test]
    fn test_retry_bounds() {
        let mut config = Config::default();
        config.retry.jitter_factor = 1.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.retry.initial_delay_ms = 5_000;
        config.retry.max_delay_ms = 10;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.retry.exponential_base = f64::NAN;
        assert!(validate(&config).is_err());
    }
}
