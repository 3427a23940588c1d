//! The unwrap component: ports, properties and the processing task.
//!
//! A started component runs one tokio task that repeatedly pulls a batch from its input
//! port, processes it to completion and pushes the result to its output port. Only that
//! task touches per-stream state. Shutdown is observed between batches only, so a stop
//! never leaves a stream half-updated.
//!
//! # Example
//!
//! ```no_run
//! use daq_unwrap::component::UnwrapComponent;
//! use daq_unwrap::config::UnwrapConfig;
//! use daq_unwrap::core::OutputEvent;
//!
//! # async fn demo() -> Result<(), daq_unwrap::error::UnwrapError> {
//! let mut component = UnwrapComponent::new(&UnwrapConfig::default())?;
//! let mut output = component.output().subscribe();
//! component.start()?;
//!
//! component
//!     .input()
//!     .push_packet(vec![3.0, -3.0], chrono::Utc::now(), true, "phase-1");
//!
//! while let Ok(event) = output.recv().await {
//!     if let OutputEvent::Packet(packet) = event {
//!         println!("{:?}", packet.data);
//!         if packet.eos {
//!             break;
//!         }
//!     }
//! }
//! component.stop().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ServiceSettings, UnwrapConfig};
use crate::core::PacketProcessor;
use crate::data::processor::UnwrapProcessor;
use crate::error::UnwrapError;
use crate::port::{InFloatPort, OutFloatPort};
use crate::properties::UnwrapProperties;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Input port name.
pub const INPUT_PORT: &str = "dataFloat_in";
/// Output port name.
pub const OUTPUT_PORT: &str = "dataFloat_out";

/// Outcome of one service iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceResult {
    /// A batch was consumed; run again immediately.
    Normal,
    /// Nothing was available; back off before the next attempt.
    Noop,
}

/// Pulls batches from `input`, runs them through `processor`, pushes to `output`.
pub struct ServiceLoop<P: PacketProcessor> {
    input: Arc<InFloatPort>,
    output: Arc<OutFloatPort>,
    processor: P,
    poll_timeout: Duration,
    idle_backoff: Duration,
}

impl<P: PacketProcessor> ServiceLoop<P> {
    /// Wires a processor between two ports.
    pub fn new(
        input: Arc<InFloatPort>,
        output: Arc<OutFloatPort>,
        processor: P,
        settings: &ServiceSettings,
    ) -> Self {
        Self {
            input,
            output,
            processor,
            poll_timeout: settings.poll_timeout(),
            idle_backoff: settings.idle_backoff(),
        }
    }

    /// Processes at most one batch.
    ///
    /// A rejected batch is logged and dropped; the loop keeps running.
    pub async fn service_function(&mut self) -> ServiceResult {
        let Some(packet) = self.input.next_packet(self.poll_timeout).await else {
            return ServiceResult::Noop;
        };

        let stream_id = packet.stream_id.clone();
        if let Err(err) = self.processor.process_packet(packet, self.output.as_ref()) {
            error!(stream_id = %stream_id, error = %err, "Batch rejected");
        }
        ServiceResult::Normal
    }

    /// Runs until `shutdown` flips or its sender is dropped, then hands back the processor.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> P {
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.service_function() => result,
            };

            if result == ServiceResult::Noop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(self.idle_backoff) => {}
                }
            }
        }
        self.processor
    }

    /// The wrapped processor.
    pub fn processor(&self) -> &P {
        &self.processor
    }
}

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<UnwrapProcessor>,
}

/// Streaming unwrap component.
pub struct UnwrapComponent {
    identifier: String,
    properties: UnwrapProperties,
    settings: ServiceSettings,
    input: Arc<InFloatPort>,
    output: Arc<OutFloatPort>,
    /// Present while stopped; moved into the task while running.
    processor: Option<UnwrapProcessor>,
    running: Option<RunningTask>,
}

impl UnwrapComponent {
    /// Builds a stopped component from configuration.
    pub fn new(config: &UnwrapConfig) -> Result<Self, UnwrapError> {
        config.validate()?;
        let properties = UnwrapProperties::from_defaults(&config.properties)?;
        Self::with_properties(&config.application.name, properties, config.service.clone())
    }

    /// Builds a stopped component around existing properties.
    pub fn with_properties(
        identifier: impl Into<String>,
        properties: UnwrapProperties,
        settings: ServiceSettings,
    ) -> Result<Self, UnwrapError> {
        let processor = UnwrapProcessor::new(&properties)?;
        Ok(Self {
            identifier: identifier.into(),
            input: Arc::new(InFloatPort::new(INPUT_PORT, settings.queue_depth)),
            output: Arc::new(OutFloatPort::new(OUTPUT_PORT, settings.output_capacity)),
            properties,
            settings,
            processor: Some(processor),
            running: None,
        })
    }

    /// Runtime properties handle.
    pub fn properties(&self) -> &UnwrapProperties {
        &self.properties
    }

    /// All properties keyed by identifier.
    pub fn query(&self) -> Map<String, Value> {
        self.properties.query()
    }

    /// Sets one property; takes effect from the next batch.
    pub fn configure(&self, id: &str, value: &Value) -> Result<(), UnwrapError> {
        self.properties.configure(id, value)
    }

    /// Input port.
    pub fn input(&self) -> Arc<InFloatPort> {
        self.input.clone()
    }

    /// Output port.
    pub fn output(&self) -> Arc<OutFloatPort> {
        self.output.clone()
    }

    /// Whether the processing task is running.
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// The processor, available while the component is stopped.
    pub fn processor(&self) -> Option<&UnwrapProcessor> {
        self.processor.as_ref()
    }

    /// Spawns the processing task on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), UnwrapError> {
        if self.running.is_some() {
            return Err(UnwrapError::AlreadyStarted);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| UnwrapError::NoRuntime)?;

        let processor = match self.processor.take() {
            Some(processor) => processor,
            None => UnwrapProcessor::new(&self.properties)?,
        };
        let service = ServiceLoop::new(
            self.input.clone(),
            self.output.clone(),
            processor,
            &self.settings,
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(service.run(shutdown_rx));
        self.running = Some(RunningTask { shutdown, handle });

        info!(component = %self.identifier, "Processing started");
        Ok(())
    }

    /// Stops the processing task, waiting up to the configured stop timeout.
    ///
    /// Stream state is kept and resumes on the next `start`. If the task does not finish in
    /// time it is aborted, its state is lost and `StopFailed` is returned.
    pub async fn stop(&mut self) -> Result<(), UnwrapError> {
        let Some(RunningTask {
            shutdown,
            mut handle,
        }) = self.running.take()
        else {
            return Ok(());
        };

        // The task may already be gone; the join below reports that.
        let _ = shutdown.send(true);

        match tokio::time::timeout(self.settings.stop_timeout(), &mut handle).await {
            Ok(Ok(processor)) => {
                self.processor = Some(processor);
                info!(component = %self.identifier, "Processing stopped");
                Ok(())
            }
            Ok(Err(join_err)) => Err(UnwrapError::StopFailed(format!(
                "Processing task failed: {}",
                join_err
            ))),
            Err(_) => {
                handle.abort();
                Err(UnwrapError::StopFailed(
                    "Processing thread did not die".to_string(),
                ))
            }
        }
    }

    /// Stops the component and discards every stream's state.
    ///
    /// A failed stop is logged, not returned; the component is released either way.
    pub async fn release(&mut self) {
        if let Err(err) = self.stop().await {
            warn!(component = %self.identifier, error = %err, "Stop failed during release");
        }
        if let Some(processor) = self.processor.as_mut() {
            processor.reset();
        }
    }
}

impl std::fmt::Debug for UnwrapComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnwrapComponent")
            .field("identifier", &self.identifier)
            .field("properties", &self.properties)
            .field("started", &self.is_started())
            .finish()
    }
}
