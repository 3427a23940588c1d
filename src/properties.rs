//! Runtime-configurable properties of the unwrap component.
//!
//! Three properties are exposed under their external identifiers:
//!
//! | id          | type   | default |
//! |-------------|--------|---------|
//! | `Val1`      | float  | -π      |
//! | `Val2`      | float  | +π      |
//! | `cxOperator`| string | "phase" |
//!
//! `Val1` and `Val2` are stored together as one `RangeBounds` value so the processing task
//! always reads a consistent pair. Writes that would make the pair degenerate are refused.
//! `cxOperator` accepts any string: an unknown name is stored and later ignored by the
//! reducer, which keeps its previous operator.

use crate::config::PropertyDefaults;
use crate::data::range::RangeBounds;
use crate::error::UnwrapError;
use crate::parameter::Parameter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Identifier of the first bound.
pub const VAL1: &str = "Val1";
/// Identifier of the second bound.
pub const VAL2: &str = "Val2";
/// Identifier of the complex reduction selector.
pub const CX_OPERATOR: &str = "cxOperator";

struct Inner {
    bounds: Parameter<RangeBounds>,
    cx_operator: Parameter<String>,
}

/// Shared handle to the component's properties. Cloning is cheap.
#[derive(Clone)]
pub struct UnwrapProperties {
    inner: Arc<Inner>,
}

impl UnwrapProperties {
    /// Creates the properties with explicit initial values.
    pub fn new(bounds: RangeBounds, cx_operator: impl Into<String>) -> Result<Self, UnwrapError> {
        bounds.validate()?;
        Ok(Self::build(bounds, cx_operator.into()))
    }

    fn build(bounds: RangeBounds, cx_operator: String) -> Self {
        let bounds = Parameter::new("bounds", bounds)
            .with_description("Wrap interval bounds (Val1, Val2), either order")
            .with_validator(RangeBounds::validate);
        let cx_operator = Parameter::new(CX_OPERATOR, cx_operator)
            .with_description("Complex to real reduction: phase, abs, norm, real or imag");

        Self {
            inner: Arc::new(Inner {
                bounds,
                cx_operator,
            }),
        }
    }

    /// Creates the properties from configuration defaults.
    pub fn from_defaults(defaults: &PropertyDefaults) -> Result<Self, UnwrapError> {
        Self::new(
            RangeBounds::new(defaults.val1, defaults.val2),
            defaults.cx_operator.clone(),
        )
    }

    /// Current bounds.
    pub fn bounds(&self) -> RangeBounds {
        self.inner.bounds.get()
    }

    /// Current `Val1`.
    pub fn val1(&self) -> f32 {
        self.bounds().val1
    }

    /// Current `Val2`.
    pub fn val2(&self) -> f32 {
        self.bounds().val2
    }

    /// Current reduction selector, exactly as configured.
    pub fn cx_operator(&self) -> String {
        self.inner.cx_operator.get()
    }

    /// Replaces both bounds at once.
    pub fn set_bounds(&self, val1: f32, val2: f32) -> Result<(), UnwrapError> {
        self.inner.bounds.set(RangeBounds::new(val1, val2))
    }

    /// Replaces `Val1`, keeping `Val2`.
    pub fn set_val1(&self, val1: f32) -> Result<(), UnwrapError> {
        self.inner.bounds.update(|b| RangeBounds { val1, ..*b })
    }

    /// Replaces `Val2`, keeping `Val1`.
    pub fn set_val2(&self, val2: f32) -> Result<(), UnwrapError> {
        self.inner.bounds.update(|b| RangeBounds { val2, ..*b })
    }

    /// Replaces the reduction selector. Unknown names are accepted.
    pub fn set_cx_operator(&self, selector: impl Into<String>) {
        // No constraints are attached, so this cannot fail.
        let _ = self.inner.cx_operator.set(selector.into());
    }

    /// Receiver used by the processing task to observe bound changes.
    pub fn subscribe_bounds(&self) -> watch::Receiver<RangeBounds> {
        self.inner.bounds.subscribe()
    }

    /// Receiver used by the processing task to observe selector changes.
    pub fn subscribe_cx_operator(&self) -> watch::Receiver<String> {
        self.inner.cx_operator.subscribe()
    }

    /// All properties as a JSON object keyed by identifier.
    pub fn query(&self) -> Map<String, Value> {
        let bounds = self.bounds();
        let mut props = Map::new();
        props.insert(VAL1.to_string(), Value::from(bounds.val1));
        props.insert(VAL2.to_string(), Value::from(bounds.val2));
        props.insert(CX_OPERATOR.to_string(), Value::from(self.cx_operator()));
        props
    }

    /// Sets one property from a JSON value.
    pub fn configure(&self, id: &str, value: &Value) -> Result<(), UnwrapError> {
        match id {
            VAL1 => self.set_val1(as_f32(id, value)?)?,
            VAL2 => self.set_val2(as_f32(id, value)?)?,
            CX_OPERATOR => {
                let selector = value.as_str().ok_or_else(|| UnwrapError::PropertyType {
                    id: id.to_string(),
                    reason: format!("expected a string, got {}", value),
                })?;
                self.set_cx_operator(selector);
            }
            other => return Err(UnwrapError::UnknownProperty(other.to_string())),
        }
        info!(property = id, value = %value, "Property configured");
        Ok(())
    }

    /// Sets several properties, stopping at the first failure.
    pub fn configure_all<'a>(
        &self,
        props: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> Result<(), UnwrapError> {
        props
            .into_iter()
            .try_for_each(|(id, value)| self.configure(id, value))
    }
}

impl Default for UnwrapProperties {
    fn default() -> Self {
        Self::build(RangeBounds::default(), "phase".to_string())
    }
}

impl std::fmt::Debug for UnwrapProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnwrapProperties")
            .field("bounds", &self.bounds())
            .field("cx_operator", &self.cx_operator())
            .finish()
    }
}

fn as_f32(id: &str, value: &Value) -> Result<f32, UnwrapError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| UnwrapError::PropertyType {
            id: id.to_string(),
            reason: format!("expected a number, got {}", value),
        })
}
