//! The unwrap algorithm.
//!
//! Each sample is first folded to its principal value inside the configured interval and
//! compared against the previous principal value. A jump larger than half the interval
//! width means the underlying signal crossed a wrap boundary, so the integer wrap index is
//! moved by one before the output is reconstructed as `principal + difference * wrap_index`.
//!
//! Only one crossing per sample pair can be resolved. Input that moves by more than half an
//! interval between consecutive samples resolves to the nearest wrap, which is not
//! necessarily the true one.
//!
//! The arithmetic is done in `f32` to match the sample type, and follows two conventions
//! that differ from the "obvious" ones:
//!
//! - the initial wrap index truncates toward zero instead of flooring, and
//! - the principal value uses the raw remainder, so it is not refolded when the input lies
//!   below `min_val`.

use super::range::RangeConfig;

/// Unwraps a batch of samples for one stream.
#[derive(Debug, Clone, Copy)]
pub struct UnwrapEngine {
    range: RangeConfig,
}

impl UnwrapEngine {
    /// Creates an engine for the given interval.
    pub fn new(range: RangeConfig) -> Self {
        Self { range }
    }

    /// The interval in use.
    pub fn range(&self) -> &RangeConfig {
        &self.range
    }

    /// Unwraps `samples` in place.
    ///
    /// `last_value` is the unwrapped value of the previous sample of this stream, or `None`
    /// when the stream has no history; the batch then bootstraps from its own first sample.
    /// Returns the unwrapped value of the final sample, or `None` for an empty batch.
    pub fn unwrap_in_place(&self, samples: &mut [f32], last_value: Option<f32>) -> Option<f32> {
        let first = *samples.first()?;
        let last_val = last_value.unwrap_or(first);

        let difference = self.range.difference();
        let half_difference = self.range.half_difference();

        // `as` truncates toward zero.
        let mut wrap_index = ((last_val - self.range.min_val()) / difference) as i64;
        let mut last_principal = last_val - wrap_index as f32 * difference;

        for sample in samples.iter_mut() {
            let principal = self.range.principal(*sample);
            // Saturates for histories beyond what the index can count.
            if principal - last_principal > half_difference {
                wrap_index = wrap_index.saturating_sub(1);
            } else if last_principal - principal > half_difference {
                wrap_index = wrap_index.saturating_add(1);
            }
            last_principal = principal;
            *sample = principal + difference * wrap_index as f32;
        }

        samples.last().copied()
    }

    /// Unwraps a copy of `samples`, returning the output and the value to persist.
    pub fn unwrap(&self, samples: &[f32], last_value: Option<f32>) -> (Vec<f32>, Option<f32>) {
        let mut output = samples.to_vec();
        let last = self.unwrap_in_place(&mut output, last_value);
        (output, last)
    }
}

impl Default for UnwrapEngine {
    fn default() -> Self {
        Self::new(RangeConfig::default())
    }
}
