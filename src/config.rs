//! Configuration System using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`UnwrapConfig::default()`)
//! 2. A TOML file (`config/default.toml` unless another path is given)
//! 3. Environment variables prefixed with `DAQ_UNWRAP_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use daq_unwrap::config::UnwrapConfig;
//!
//! let config = UnwrapConfig::load()?;
//! config.validate()?;
//! println!("Wrap interval: [{}, {}]", config.properties.val1, config.properties.val2);
//! # Ok::<(), daq_unwrap::error::UnwrapError>(())
//! ```
//!
//! Override a single value from the environment:
//! ```text
//! DAQ_UNWRAP_PROPERTIES__CX_OPERATOR=abs daq-unwrap unwrap --input samples.txt
//! ```

use crate::data::range::RangeBounds;
use crate::error::UnwrapError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAQ_UNWRAP_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UnwrapConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Initial values of the runtime properties
    #[serde(default)]
    pub properties: PropertyDefaults,
    /// Processing task and port settings
    #[serde(default)]
    pub service: ServiceSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Initial property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefaults {
    /// First wrap bound
    #[serde(default = "default_val1")]
    pub val1: f32,
    /// Second wrap bound
    #[serde(default = "default_val2")]
    pub val2: f32,
    /// Complex to real reduction selector
    #[serde(default = "default_cx_operator")]
    pub cx_operator: String,
}

/// Processing task and port settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Maximum packets held by the input port before it flushes
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// How long one service iteration waits for a packet, in milliseconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Pause after an iteration that found no packet, in milliseconds
    #[serde(default = "default_idle_backoff")]
    pub idle_backoff_ms: u64,
    /// How long `stop` waits for the processing task, in milliseconds
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
    /// Events buffered per output subscriber before it lags
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

// Default value functions
fn default_name() -> String {
    "daq-unwrap".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_val1() -> f32 {
    -std::f32::consts::PI
}

fn default_val2() -> f32 {
    std::f32::consts::PI
}

fn default_cx_operator() -> String {
    "phase".to_string()
}

fn default_queue_depth() -> usize {
    100
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_idle_backoff() -> u64 {
    10
}

fn default_stop_timeout() -> u64 {
    5000
}

fn default_output_capacity() -> usize {
    1024
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PropertyDefaults {
    fn default() -> Self {
        Self {
            val1: default_val1(),
            val2: default_val2(),
            cx_operator: default_cx_operator(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            poll_timeout_ms: default_poll_timeout(),
            idle_backoff_ms: default_idle_backoff(),
            stop_timeout_ms: default_stop_timeout(),
            output_capacity: default_output_capacity(),
        }
    }
}

impl ServiceSettings {
    /// Packet wait per service iteration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Pause after an idle iteration
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Stop deadline
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl UnwrapConfig {
    /// Load configuration from `config/default.toml` and environment variables
    pub fn load() -> Result<Self, UnwrapError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, UnwrapError> {
        Ok(Self::figment(path).extract()?)
    }

    /// The layered provider, exposed so callers can merge further sources
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), UnwrapError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(UnwrapError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        // Bounds must span a non-empty interval
        self.bounds().validate()?;

        if self.service.queue_depth == 0 {
            return Err(UnwrapError::Configuration(
                "Invalid queue_depth 0. Must be at least 1".to_string(),
            ));
        }

        if self.service.output_capacity == 0 {
            return Err(UnwrapError::Configuration(
                "Invalid output_capacity 0. Must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured bounds as a pair
    pub fn bounds(&self) -> RangeBounds {
        RangeBounds::new(self.properties.val1, self.properties.val2)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, UnwrapError> {
        toml::to_string_pretty(self).map_err(|e| UnwrapError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = UnwrapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.properties.cx_operator, "phase");
        assert_eq!(config.service.queue_depth, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = UnwrapConfig::default();

        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
        config.application.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.properties.val2 = config.properties.val1;
        assert!(matches!(
            config.validate(),
            Err(UnwrapError::InvalidRange { .. })
        ));
        config.properties.val2 = 10.0;

        config.service.queue_depth = 0;
        assert!(config.validate().is_err());
        config.service.queue_depth = 1;

        config.service.output_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_operator_passes_validation() {
        let mut config = UnwrapConfig::default();
        config.properties.cx_operator = "magnitude".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: UnwrapConfig = toml::from_str(
            r#"
            [properties]
            val1 = 100.0
            val2 = 200.0
            "#,
        )
        .unwrap();

        assert_eq!(config.bounds(), RangeBounds::new(100.0, 200.0));
        assert_eq!(config.properties.cx_operator, "phase");
        assert_eq!(config.service, ServiceSettings::default());
        assert_eq!(config.application.log_level, "info");
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let config = UnwrapConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: UnwrapConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_durations() {
        let service = ServiceSettings::default();
        assert_eq!(service.poll_timeout(), Duration::from_millis(100));
        assert_eq!(service.idle_backoff(), Duration::from_millis(10));
        assert_eq!(service.stop_timeout(), Duration::from_secs(5));
    }
}
