//! Wrap interval derived from the two configured bounds.
use crate::error::UnwrapError;
use serde::{Deserialize, Serialize};

/// The pair of bounds as configured, in either order.
///
/// Kept together so that a reader always observes both halves of an update.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RangeBounds {
    /// First bound (`Val1`).
    pub val1: f32,
    /// Second bound (`Val2`).
    pub val2: f32,
}

impl RangeBounds {
    /// Creates a new pair of bounds.
    pub fn new(val1: f32, val2: f32) -> Self {
        Self { val1, val2 }
    }

    /// Rejects pairs that cannot describe a wrap interval.
    pub fn validate(&self) -> Result<(), UnwrapError> {
        RangeConfig::from_bounds(*self).map(|_| ())
    }
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self {
            val1: -std::f32::consts::PI,
            val2: std::f32::consts::PI,
        }
    }
}

/// The wrap interval `[min_val, max_val]` used by the unwrap engine.
///
/// `difference` is always finite and strictly positive for a constructed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeConfig {
    min_val: f32,
    max_val: f32,
    difference: f32,
    half_difference: f32,
}

impl RangeConfig {
    /// Derives the interval from two bounds given in either order.
    pub fn new(val1: f32, val2: f32) -> Result<Self, UnwrapError> {
        let max_val = val1.max(val2);
        let min_val = val1.min(val2);
        let difference = max_val - min_val;

        // NaN fails the comparison as well.
        if !(difference > 0.0) || !difference.is_finite() {
            return Err(UnwrapError::InvalidRange { val1, val2 });
        }

        Ok(Self {
            min_val,
            max_val,
            difference,
            half_difference: difference / 2.0,
        })
    }

    /// Derives the interval from a bounds pair.
    pub fn from_bounds(bounds: RangeBounds) -> Result<Self, UnwrapError> {
        Self::new(bounds.val1, bounds.val2)
    }

    /// Lower edge of the interval.
    pub fn min_val(&self) -> f32 {
        self.min_val
    }

    /// Upper edge of the interval.
    pub fn max_val(&self) -> f32 {
        self.max_val
    }

    /// Interval width.
    pub fn difference(&self) -> f32 {
        self.difference
    }

    /// Half the interval width, the crossing threshold between consecutive samples.
    pub fn half_difference(&self) -> f32 {
        self.half_difference
    }

    /// Folds `x` into the interval with the raw floating point remainder.
    ///
    /// Inputs below `min_val` are not folded back up, so the result can lie below the
    /// interval. The unwrap engine depends on this exact convention.
    #[inline]
    pub fn principal(&self, x: f32) -> f32 {
        (x - self.min_val) % self.difference + self.min_val
    }
}

impl Default for RangeConfig {
    fn default() -> Self {
        let pi = std::f32::consts::PI;
        Self {
            min_val: -pi,
            max_val: pi,
            difference: 2.0 * pi,
            half_difference: pi,
        }
    }
}
