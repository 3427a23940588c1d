//! Custom error types for the unwrap component.
//!
//! This module defines `UnwrapError`, the single error type returned by the library. It is
//! built with `thiserror` so that every failure carries a readable message and can be
//! propagated with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidRange`**: The two configured bounds are equal or not finite. The unwrap formula
//!   divides by their difference.
//! - **`Config`** / **`Configuration`**: Parse failures from `figment` and semantic validation
//!   failures of an otherwise well-formed file.
//! - **`UnknownProperty`** / **`PropertyType`**: Rejected `configure` calls against the
//!   runtime properties.
//! - **`NoRuntime`** / **`AlreadyStarted`** / **`StopFailed`**: Lifecycle errors raised by
//!   `UnwrapComponent::start` and `UnwrapComponent::stop`.
//!
//! An unrecognised complex reduction mode is not an error: selecting one leaves the previous
//! mapping active and logs a warning.

use thiserror::Error;

/// Convenience alias for results using the component error type.
pub type AppResult<T> = std::result::Result<T, UnwrapError>;

/// Errors produced by the unwrap component.
#[derive(Error, Debug)]
pub enum UnwrapError {
    /// The wrap interval is empty or not finite.
    #[error("Invalid range: Val1={val1} and Val2={val2} must be finite and distinct")]
    InvalidRange {
        /// First configured bound.
        val1: f32,
        /// Second configured bound.
        val2: f32,
    },

    /// Loading or extracting the layered configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration parsed but holds values that make no sense.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// `configure` named a property the component does not expose.
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// `configure` supplied a value of the wrong type for a property.
    #[error("Property '{id}' rejected value: {reason}")]
    PropertyType {
        /// Property identifier.
        id: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// `start` was called outside of a tokio runtime.
    #[error("No tokio runtime available to run the processing task")]
    NoRuntime,

    /// `start` was called while the processing task is already running.
    #[error("Component is already started")]
    AlreadyStarted,

    /// The processing task did not finish within the stop timeout.
    #[error("Stop failed: {0}")]
    StopFailed(String),
}

impl From<figment::Error> for UnwrapError {
    fn from(value: figment::Error) -> Self {
        UnwrapError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_message_names_both_bounds() {
        let err = UnwrapError::InvalidRange {
            val1: 1.5,
            val2: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("Val1=1.5"));
        assert!(msg.contains("Val2=1.5"));
    }

    #[test]
    fn figment_errors_convert() {
        let err: UnwrapError = figment::Error::from("bad key".to_string()).into();
        match err {
            UnwrapError::Config(inner) => assert!(inner.to_string().contains("bad key")),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn stop_failure_is_descriptive() {
        let err = UnwrapError::StopFailed("Processing thread did not die".into());
        assert_eq!(err.to_string(), "Stop failed: Processing thread did not die");
    }
}
