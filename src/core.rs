//! Core traits and data types for moving sample batches through the component.
use crate::error::UnwrapError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a stream carries real samples or interleaved `re, im` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// One value per sample.
    #[default]
    Real,
    /// Two values per sample, real then imaginary.
    Complex,
}

impl SampleMode {
    /// Returns true for complex streams.
    pub fn is_complex(&self) -> bool {
        matches!(self, SampleMode::Complex)
    }
}

/// Stream metadata (signal related information) announced ahead of a stream's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sri {
    /// Stream the metadata describes.
    pub stream_id: String,
    /// Sample layout.
    pub mode: SampleMode,
    /// Sample spacing in seconds, passed through untouched.
    pub xdelta: f64,
}

impl Sri {
    /// Default real-valued metadata for a stream.
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            mode: SampleMode::Real,
            xdelta: 1.0,
        }
    }

    /// Sets the sample layout.
    pub fn with_mode(mut self, mode: SampleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the sample spacing.
    pub fn with_xdelta(mut self, xdelta: f64) -> Self {
        self.xdelta = xdelta;
        self
    }
}

/// One batch delivered by the input port.
#[derive(Debug, Clone)]
pub struct InputPacket {
    /// Stream the batch belongs to.
    pub stream_id: String,
    /// Metadata in effect for this batch.
    pub sri: Sri,
    /// The metadata changed since the previous batch of this stream.
    pub sri_changed: bool,
    /// Raw values; interleaved pairs when `sri.mode` is complex.
    pub data: Vec<f32>,
    /// Time stamp of the first sample.
    pub timestamp: DateTime<Utc>,
    /// This batch ends the stream.
    pub eos: bool,
    /// Queued data was discarded upstream before this batch.
    pub input_queue_flushed: bool,
}

impl InputPacket {
    /// Builds a real-valued batch with fresh metadata. Mostly useful in tests.
    pub fn new(stream_id: impl Into<String>, data: Vec<f32>) -> Self {
        let stream_id = stream_id.into();
        Self {
            sri: Sri::new(stream_id.clone()),
            stream_id,
            sri_changed: false,
            data,
            timestamp: Utc::now(),
            eos: false,
            input_queue_flushed: false,
        }
    }
}

/// One processed batch handed to the output side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPacket {
    /// Stream the batch belongs to.
    pub stream_id: String,
    /// Unwrapped real values.
    pub data: Vec<f32>,
    /// Time stamp copied from the input batch.
    pub timestamp: DateTime<Utc>,
    /// End-of-stream flag copied from the input batch.
    pub eos: bool,
}

/// What a sink observes, in push order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Metadata announcement.
    Sri(Sri),
    /// Data batch.
    Packet(OutputPacket),
}

/// Downstream receiver of metadata and data batches.
pub trait PacketSink: Send + Sync {
    /// Announces (or re-announces) metadata for a stream.
    fn push_sri(&self, sri: &Sri);

    /// Delivers a processed batch.
    fn push_packet(&self, packet: OutputPacket);
}

/// A stateful batch processor driven by the service loop.
///
/// Implementations must apply a batch completely or not at all.
pub trait PacketProcessor: Send {
    /// Processes one batch, pushing any output to `sink`.
    fn process_packet(&mut self, packet: InputPacket, sink: &dyn PacketSink)
        -> Result<(), UnwrapError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that records everything pushed to it.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<OutputEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<OutputEvent> {
            self.events.lock().clone()
        }

        pub fn packets(&self) -> Vec<OutputPacket> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    OutputEvent::Packet(packet) => Some(packet),
                    OutputEvent::Sri(_) => None,
                })
                .collect()
        }

        pub fn sris(&self) -> Vec<Sri> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    OutputEvent::Sri(sri) => Some(sri),
                    OutputEvent::Packet(_) => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.events.lock().clear();
        }
    }

    impl PacketSink for RecordingSink {
        fn push_sri(&self, sri: &Sri) {
            self.events.lock().push(OutputEvent::Sri(sri.clone()));
        }

        fn push_packet(&self, packet: OutputPacket) {
            self.events.lock().push(OutputEvent::Packet(packet));
        }
    }
}
