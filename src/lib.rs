//! # DAQ Unwrap Library
//!
//! This crate implements a streaming unwrap component. It takes batches of real or complex
//! samples that live on a bounded interval (for example phase in `[-π, π)`) and emits a
//! continuous real-valued sequence, removing the jumps caused by wrap-around. Continuity is
//! kept independently for each stream, across batch boundaries, until the stream ends.
//!
//! ## Crate Structure
//!
//! - **`component`**: `UnwrapComponent`, which owns the ports, the properties and the
//!   processing task, and exposes `start`/`stop`/`release`.
//! - **`config`**: Layered configuration (defaults, TOML file, environment) via `figment`.
//!   See `config::UnwrapConfig`.
//! - **`core`**: Stream metadata, packet types, and the `PacketSink`/`PacketProcessor`
//!   traits that connect the processing code to its ports.
//! - **`data`**: The processing itself: wrap interval, complex reduction, the unwrap
//!   algorithm, per-stream state and the coordinator that ties them together.
//! - **`error`**: The `UnwrapError` enum used across the crate.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`parameter`**: `Parameter<T>`, an observable value with constraints.
//! - **`port`**: In-process input and output ports.
//! - **`properties`**: The runtime properties `Val1`, `Val2` and `cxOperator`.

pub mod component;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod logging;
pub mod parameter;
pub mod port;
pub mod properties;

pub use component::UnwrapComponent;
pub use config::UnwrapConfig;
pub use error::{AppResult, UnwrapError};
