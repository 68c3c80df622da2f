//! Global subscriber installation. Kept in its own test binary because
//! only one subscriber can be installed per process.

use vigil_telemetry::{LogConfig, LogFormat, TelemetryError, setup_default_logging, setup_logging};

#[test]
fn test_setup_logging_installs_once() {
    let config = LogConfig::new("debug")
        .with_format(LogFormat::Json)
        .with_directive("vigil_events=trace")
        .with_span_events()
        .without_ansi();

    setup_logging(&config).unwrap();
    tracing::info!(bus_id = "test", "subscriber installed");

    let err = setup_default_logging().unwrap_err();
    assert!(matches!(err, TelemetryError::InitError(_)));
}

#[test]
fn test_invalid_directive_is_rejected_before_install() {
    let config = LogConfig::new("info").with_directive("[broken");
    let err = setup_logging(&config).unwrap_err();
    assert!(matches!(err, TelemetryError::ConfigError(_)));
}
