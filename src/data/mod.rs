//! Data processing: the unwrap algorithm and the per-stream state around it.
pub mod complex;
pub mod processor;
pub mod range;
pub mod stream_state;
pub mod unwrap;
