//! Configuration layering: defaults, TOML file, then environment.
//!
//! Tests that touch `DAQ_UNWRAP_*` variables run serially.

use daq_unwrap::config::UnwrapConfig;
use daq_unwrap::error::UnwrapError;
use daq_unwrap::UnwrapComponent;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp config");
    file
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let config = UnwrapConfig::load_from("does/not/exist.toml").unwrap();
    assert_eq!(config, UnwrapConfig::default());
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
        [application]
        log_level = "debug"

        [properties]
        val1 = 200.0
        val2 = 100.0
        cx_operator = "abs"
        "#,
    );

    let config = UnwrapConfig::load_from(file.path()).unwrap();
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.properties.val1, 200.0);
    assert_eq!(config.properties.val2, 100.0);
    assert_eq!(config.properties.cx_operator, "abs");
    assert_eq!(config.service.queue_depth, 100);
    assert!(config.validate().is_ok());

    let component = UnwrapComponent::new(&config).unwrap();
    assert_eq!(component.properties().cx_operator(), "abs");
    assert_eq!(component.input().max_queue_depth(), 100);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config(
        r#"
        [properties]
        cx_operator = "abs"

        [service]
        queue_depth = 8
        "#,
    );

    std::env::set_var("DAQ_UNWRAP_PROPERTIES__CX_OPERATOR", "imag");
    std::env::set_var("DAQ_UNWRAP_SERVICE__STOP_TIMEOUT_MS", "250");
    let loaded = UnwrapConfig::load_from(file.path());
    std::env::remove_var("DAQ_UNWRAP_PROPERTIES__CX_OPERATOR");
    std::env::remove_var("DAQ_UNWRAP_SERVICE__STOP_TIMEOUT_MS");

    let config = loaded.unwrap();
    assert_eq!(config.properties.cx_operator, "imag");
    assert_eq!(config.service.queue_depth, 8);
    assert_eq!(config.service.stop_timeout_ms, 250);
}

#[test]
#[serial]
fn test_malformed_file_is_reported() {
    let file = write_config("[properties]\nval1 = \"not a number\"\n");
    assert!(matches!(
        UnwrapConfig::load_from(file.path()),
        Err(UnwrapError::Config(_))
    ));
}

#[test]
#[serial]
fn test_degenerate_bounds_refuse_component() {
    let file = write_config("[properties]\nval1 = 5.0\nval2 = 5.0\n");
    let config = UnwrapConfig::load_from(file.path()).unwrap();
    assert!(matches!(
        UnwrapComponent::new(&config),
        Err(UnwrapError::InvalidRange { .. })
    ));
}

#[test]
#[serial]
fn test_shown_config_reloads_identically() {
    let file = write_config("[service]\nidle_backoff_ms = 3\n");
    let config = UnwrapConfig::load_from(file.path()).unwrap();

    let rendered = write_config(&config.to_toml().unwrap());
    let reloaded = UnwrapConfig::load_from(rendered.path()).unwrap();
    assert_eq!(reloaded, config);
}
