//! Complex to real reduction applied before unwrapping complex streams.
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Function used to map a complex sample to a real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexOperator {
    /// Angle of the sample, in (-π, π].
    #[default]
    Phase,
    /// Magnitude.
    Abs,
    /// Squared magnitude.
    Norm,
    /// Real component.
    Real,
    /// Imaginary component.
    Imag,
}

impl ComplexOperator {
    /// All operators in selector order.
    pub const ALL: [ComplexOperator; 5] = [
        ComplexOperator::Phase,
        ComplexOperator::Abs,
        ComplexOperator::Norm,
        ComplexOperator::Real,
        ComplexOperator::Imag,
    ];

    /// The selector string for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexOperator::Phase => "phase",
            ComplexOperator::Abs => "abs",
            ComplexOperator::Norm => "norm",
            ComplexOperator::Real => "real",
            ComplexOperator::Imag => "imag",
        }
    }

    /// Applies the operator to one sample.
    #[inline]
    pub fn apply(&self, value: Complex32) -> f32 {
        match self {
            ComplexOperator::Phase => value.arg(),
            ComplexOperator::Abs => value.norm(),
            ComplexOperator::Norm => value.norm_sqr(),
            ComplexOperator::Real => value.re,
            ComplexOperator::Imag => value.im,
        }
    }
}

impl fmt::Display for ComplexOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a selector string names no operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl fmt::Display for UnknownOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown complex operator '{}'", self.0)
    }
}

impl std::error::Error for UnknownOperator {}

impl FromStr for ComplexOperator {
    type Err = UnknownOperator;

    /// Matching is exact: selectors are lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComplexOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

/// Holds the active operator and reduces complex batches with it.
#[derive(Debug, Clone, Default)]
pub struct ComplexReducer {
    operator: ComplexOperator,
}

impl ComplexReducer {
    /// Creates a reducer with an explicit operator.
    pub fn new(operator: ComplexOperator) -> Self {
        Self { operator }
    }

    /// Creates a reducer from a selector, falling back to `phase` for unknown names.
    pub fn from_selector(selector: &str) -> Self {
        let mut reducer = Self::default();
        reducer.select(selector);
        reducer
    }

    /// The operator currently in effect.
    pub fn operator(&self) -> ComplexOperator {
        self.operator
    }

    /// Switches to the operator named by `selector`.
    ///
    /// An unknown name leaves the current operator in place and returns `false`.
    pub fn select(&mut self, selector: &str) -> bool {
        match selector.parse::<ComplexOperator>() {
            Ok(operator) => {
                self.operator = operator;
                true
            }
            Err(err) => {
                warn!(
                    current = %self.operator,
                    "{}; keeping current complex operator", err
                );
                false
            }
        }
    }

    /// Maps every complex sample to a real value, preserving length and order.
    pub fn reduce(&self, samples: &[Complex32]) -> Vec<f32> {
        let operator = self.operator;
        samples.iter().map(|&value| operator.apply(value)).collect()
    }
}

/// Decodes an interleaved `re, im, re, im, ...` buffer into complex samples.
///
/// A trailing unpaired value is dropped with a warning.
pub fn decode_complex(interleaved: &[f32]) -> Vec<Complex32> {
    let pairs = interleaved.chunks_exact(2);
    if !pairs.remainder().is_empty() {
        warn!(
            len = interleaved.len(),
            "Complex buffer has an odd number of values; dropping the trailing value"
        );
    }
    pairs.map(|pair| Complex32::new(pair[0], pair[1])).collect()
}
