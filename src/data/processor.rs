//! Per-batch stream lifecycle around the unwrap engine.
use crate::core::{InputPacket, OutputPacket, PacketProcessor, PacketSink, SampleMode};
use crate::data::complex::{decode_complex, ComplexReducer};
use crate::data::range::{RangeBounds, RangeConfig};
use crate::data::stream_state::StreamStateStore;
use crate::data::unwrap::UnwrapEngine;
use crate::error::UnwrapError;
use crate::properties::UnwrapProperties;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Unwraps every stream that passes through it.
///
/// For each batch:
/// 1. A flushed input queue discards the state of every stream.
/// 2. New streams, and streams whose metadata changed, have their complex flag recorded and
///    real-valued metadata announced downstream.
/// 3. Non-empty batches are reduced to real values if complex, unwrapped against the
///    stream's last value, and pushed downstream.
/// 4. End of stream forgets the stream.
///
/// Range and reduction changes are picked up at the start of a batch, never during one.
pub struct UnwrapProcessor {
    bounds_rx: watch::Receiver<RangeBounds>,
    operator_rx: watch::Receiver<String>,
    engine: UnwrapEngine,
    reducer: ComplexReducer,
    streams: StreamStateStore,
    /// Bounds that failed validation and have not been replaced since.
    rejected_bounds: Option<RangeBounds>,
}

impl UnwrapProcessor {
    /// Creates a processor that follows `properties`.
    pub fn new(properties: &UnwrapProperties) -> Result<Self, UnwrapError> {
        Self::from_receivers(
            properties.subscribe_bounds(),
            properties.subscribe_cx_operator(),
        )
    }

    pub(crate) fn from_receivers(
        mut bounds_rx: watch::Receiver<RangeBounds>,
        mut operator_rx: watch::Receiver<String>,
    ) -> Result<Self, UnwrapError> {
        let range = RangeConfig::from_bounds(*bounds_rx.borrow_and_update())?;
        let reducer = ComplexReducer::from_selector(&operator_rx.borrow_and_update());

        Ok(Self {
            bounds_rx,
            operator_rx,
            engine: UnwrapEngine::new(range),
            reducer,
            streams: StreamStateStore::new(),
            rejected_bounds: None,
        })
    }

    /// Interval currently in effect.
    pub fn range(&self) -> &RangeConfig {
        self.engine.range()
    }

    /// Reducer currently in effect.
    pub fn reducer(&self) -> &ComplexReducer {
        &self.reducer
    }

    /// Per-stream state.
    pub fn streams(&self) -> &StreamStateStore {
        &self.streams
    }

    /// Forgets every stream.
    pub fn reset(&mut self) {
        self.streams.clear();
    }

    /// Applies pending property changes.
    ///
    /// Both bounds are read as one snapshot and validated before anything is committed. A
    /// degenerate pair fails this batch and every later one until valid bounds arrive; the
    /// previous range and reducer stay in place meanwhile.
    fn refresh(&mut self) -> Result<(), UnwrapError> {
        let pending = if self.bounds_rx.has_changed().unwrap_or(false) {
            Some(*self.bounds_rx.borrow_and_update())
        } else {
            self.rejected_bounds
        };

        let range = match pending.map(RangeConfig::from_bounds).transpose() {
            Ok(range) => range,
            Err(err) => {
                self.rejected_bounds = pending;
                return Err(err);
            }
        };
        self.rejected_bounds = None;

        if self.operator_rx.has_changed().unwrap_or(false) {
            let selector = self.operator_rx.borrow_and_update().clone();
            self.reducer.select(&selector);
        }

        if let Some(range) = range {
            debug!(
                min = range.min_val(),
                max = range.max_val(),
                "Wrap interval updated"
            );
            self.engine = UnwrapEngine::new(range);
        }
        Ok(())
    }
}

impl PacketProcessor for UnwrapProcessor {
    fn process_packet(
        &mut self,
        packet: InputPacket,
        sink: &dyn PacketSink,
    ) -> Result<(), UnwrapError> {
        self.refresh()?;

        if packet.input_queue_flushed {
            warn!(
                streams = self.streams.len(),
                "Input queue flushed, data was dropped upstream; discarding all stream state"
            );
            self.streams.clear();
        }

        let stream_id = packet.stream_id.as_str();
        let recorded = self.streams.get(stream_id).map(|state| state.is_complex);
        let is_complex = match recorded {
            Some(is_complex) if !packet.sri_changed => is_complex,
            _ => {
                let is_complex = packet.sri.mode.is_complex();
                if !packet.eos {
                    self.streams.set_complex(stream_id, is_complex);
                }

                // Output is always real.
                let mut sri = packet.sri.clone();
                sri.mode = SampleMode::Real;
                sink.push_sri(&sri);
                is_complex
            }
        };

        if packet.data.is_empty() {
            if packet.eos {
                self.streams.remove(stream_id);
                sink.push_packet(OutputPacket {
                    stream_id: packet.stream_id,
                    data: Vec::new(),
                    timestamp: packet.timestamp,
                    eos: true,
                });
            }
            return Ok(());
        }

        let mut samples = if is_complex {
            self.reducer.reduce(&decode_complex(&packet.data))
        } else {
            packet.data
        };

        let last_value = self.streams.last_value(stream_id);
        let new_last = self.engine.unwrap_in_place(&mut samples, last_value);

        if packet.eos {
            self.streams.remove(stream_id);
        } else if let Some(value) = new_last {
            self.streams.set_last_value(stream_id, value);
        }

        debug!(
            stream_id = %packet.stream_id,
            samples = samples.len(),
            complex = is_complex,
            eos = packet.eos,
            "Batch unwrapped"
        );

        sink.push_packet(OutputPacket {
            stream_id: packet.stream_id,
            data: samples,
            timestamp: packet.timestamp,
            eos: packet.eos,
        });
        Ok(())
    }
}
