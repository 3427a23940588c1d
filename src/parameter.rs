//! Parameter<T> - observable runtime parameters.
//!
//! A `Parameter<T>` owns the sending half of a `tokio::sync::watch` channel. Writers
//! (remote configuration, the CLI, tests) call `set`/`update` at any time; the processing
//! task holds receivers and polls `has_changed()` between batches. That flag is the
//! "dirty" signal for lazily recomputing derived state, and `borrow_and_update()` gives a
//! consistent snapshot of the whole value.
//!
//! # Example
//!
//! ```rust
//! use daq_unwrap::error::UnwrapError;
//! use daq_unwrap::parameter::Parameter;
//!
//! let gain = Parameter::new("gain", 1.0_f32).with_validator(|v| {
//!     if *v > 0.0 {
//!         Ok(())
//!     } else {
//!         Err(UnwrapError::Configuration("gain must be positive".into()))
//!     }
//! });
//! let mut rx = gain.subscribe();
//!
//! gain.set(2.5).unwrap();
//! assert!(rx.has_changed().unwrap());
//! assert_eq!(*rx.borrow_and_update(), 2.5);
//! assert!(gain.set(-1.0).is_err());
//! ```

use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::UnwrapError;

// =============================================================================
// Constraints
// =============================================================================

/// Validation function used by `Constraints::Custom`.
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), UnwrapError> + Send + Sync>;

/// Parameter constraints for validation
#[derive(Clone)]
pub enum Constraints<T> {
    /// No constraints
    None,

    /// Custom validation function
    Custom(Validator<T>),
}

impl<T> Constraints<T> {
    /// Validate value against constraints
    pub fn validate(&self, value: &T) -> Result<(), UnwrapError> {
        match self {
            Constraints::None => Ok(()),
            Constraints::Custom(validator) => validator(value),
        }
    }
}

impl<T> std::fmt::Debug for Constraints<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraints::None => write!(f, "None"),
            Constraints::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl<T> Default for Constraints<T> {
    fn default() -> Self {
        Constraints::None
    }
}

// =============================================================================
// Parameter<T>
// =============================================================================

/// Typed parameter whose changes are observable through watch receivers.
///
/// All mutators take `&self`, so a parameter can be shared behind an `Arc` between the
/// component and whatever configures it.
pub struct Parameter<T>
where
    T: Clone + Send + Sync + Debug,
{
    /// Parameter name (unique identifier)
    name: String,

    /// Parameter description
    description: Option<String>,

    /// Current value
    value_tx: watch::Sender<T>,

    /// Validation constraints
    constraints: Constraints<T>,
}

impl<T> Parameter<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    /// Create new parameter with initial value
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        let (value_tx, _) = watch::channel(initial);

        Self {
            name: name.into(),
            description: None,
            value_tx,
            constraints: Constraints::None,
        }
    }

    /// Set parameter description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set custom validation function
    pub fn with_validator(
        mut self,
        validator: impl Fn(&T) -> Result<(), UnwrapError> + Send + Sync + 'static,
    ) -> Self {
        self.constraints = Constraints::Custom(Arc::new(validator));
        self
    }

    /// Get current value
    pub fn get(&self) -> T {
        self.value_tx.borrow().clone()
    }

    /// Set value (validates, then notifies subscribers)
    ///
    /// Subscribers are marked changed even when the new value equals the old one.
    pub fn set(&self, value: T) -> Result<(), UnwrapError> {
        self.constraints.validate(&value)?;
        self.value_tx.send_replace(value);
        Ok(())
    }

    /// Atomically derive a new value from the current one.
    ///
    /// The read-modify-write happens under the channel lock, so concurrent updates of
    /// different fields of a compound value cannot overwrite each other. Nothing changes if
    /// the derived value fails validation.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), UnwrapError> {
        let mut outcome = Ok(());
        self.value_tx.send_if_modified(|current| {
            let next = f(current);
            match self.constraints.validate(&next) {
                Ok(()) => {
                    *current = next;
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome
    }

    /// Subscribe to value changes
    ///
    /// The returned receiver starts out "seen": `has_changed()` is false until the next
    /// write.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value_tx.subscribe()
    }
}

impl<T> Debug for Parameter<T>
where
    T: Clone + Send + Sync + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("value", &*self.value_tx.borrow())
            .field("constraints", &self.constraints)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(initial: f64) -> Parameter<f64> {
        Parameter::new("test", initial).with_validator(|v| {
            if (0.0..=10.0).contains(v) {
                Ok(())
            } else {
                Err(UnwrapError::Configuration(format!("{} out of range", v)))
            }
        })
    }

    #[test]
    fn test_parameter_basic() {
        let param = Parameter::new("test", 42.0);
        assert_eq!(param.get(), 42.0);

        param.set(100.0).unwrap();
        assert_eq!(param.get(), 100.0);
    }

    #[test]
    fn test_parameter_custom_validator() {
        let param = bounded(5.0);

        assert!(param.set(4.0).is_ok());
        assert!(param.set(15.0).is_err());
        assert_eq!(param.get(), 4.0);
    }

    #[test]
    fn test_update_applies_derived_value() {
        let param = bounded(1.0);
        let rx = param.subscribe();

        param.update(|v| v * 3.0).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(param.get(), 3.0);
    }

    #[test]
    fn test_update_rejected_leaves_receivers_clean() {
        let param = bounded(1.0);
        let rx = param.subscribe();

        assert!(param.update(|v| v * 100.0).is_err());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(param.get(), 1.0);
    }

    #[tokio::test]
    async fn test_parameter_subscription() {
        let param = Parameter::new("test", 0.0);
        let mut rx = param.subscribe();

        // Initial value
        assert_eq!(*rx.borrow(), 0.0);
        assert!(!rx.has_changed().unwrap());

        // Change value
        param.set(42.0).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 42.0);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_parameter_metadata() {
        let param = Parameter::new("cxOperator", "phase".to_string())
            .with_description("Complex to real reduction");

        let debug = format!("{:?}", param);
        assert!(debug.contains("cxOperator"));
        assert!(debug.contains("Complex to real reduction"));
        assert!(debug.contains("phase"));
    }
}
