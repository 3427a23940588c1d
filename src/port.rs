//! In-process bulk data ports.
//!
//! `InFloatPort` is the upstream end the component pulls batches from. It keeps the latest
//! metadata per stream, tags each packet with whether that metadata changed, and flushes
//! its queue when a producer outruns the consumer. The next packet delivered after a flush
//! carries `input_queue_flushed = true`.
//!
//! `OutFloatPort` is the downstream end. It broadcasts metadata announcements and data
//! batches to every subscriber in push order.

use crate::core::{InputPacket, OutputEvent, OutputPacket, PacketSink, Sri};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};

#[derive(Default)]
struct InputQueue {
    packets: VecDeque<InputPacket>,
    /// Latest metadata per stream, plus whether it is still unseen by the consumer.
    current_sri: HashMap<String, (Sri, bool)>,
    flushed: bool,
}

/// Input side of the component.
pub struct InFloatPort {
    name: String,
    max_queue_depth: usize,
    queue: Mutex<InputQueue>,
    notify: Notify,
    /// Signalled whenever the consumer frees a slot.
    space: Notify,
}

impl InFloatPort {
    /// Creates a port that holds at most `max_queue_depth` packets.
    pub fn new(name: impl Into<String>, max_queue_depth: usize) -> Self {
        Self {
            name: name.into(),
            max_queue_depth: max_queue_depth.max(1),
            queue: Mutex::new(InputQueue::default()),
            notify: Notify::new(),
            space: Notify::new(),
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records new metadata; the next packet of that stream is marked `sri_changed`.
    pub fn push_sri(&self, sri: Sri) {
        let mut queue = self.queue.lock();
        queue.current_sri.insert(sri.stream_id.clone(), (sri, true));
    }

    /// Enqueues a batch for `stream_id`.
    ///
    /// A stream that never had metadata pushed gets default real metadata. End of stream
    /// forgets the stream's metadata, so a later stream reusing the ID starts fresh.
    pub fn push_packet(
        &self,
        data: Vec<f32>,
        timestamp: DateTime<Utc>,
        eos: bool,
        stream_id: impl Into<String>,
    ) {
        let stream_id = stream_id.into();
        {
            let mut queue = self.queue.lock();

            let (sri, sri_changed) = match queue.current_sri.get_mut(&stream_id) {
                Some((sri, pending)) => {
                    let changed = std::mem::replace(pending, false);
                    (sri.clone(), changed)
                }
                None => (Sri::new(stream_id.clone()), true),
            };
            if eos {
                queue.current_sri.remove(&stream_id);
            } else if !queue.current_sri.contains_key(&stream_id) {
                queue
                    .current_sri
                    .insert(stream_id.clone(), (sri.clone(), false));
            }

            if queue.packets.len() >= self.max_queue_depth {
                warn!(
                    port = %self.name,
                    dropped = queue.packets.len(),
                    "Input queue full; flushing queued packets"
                );
                queue.packets.clear();
                queue.flushed = true;
            }

            queue.packets.push_back(InputPacket {
                stream_id,
                sri,
                sri_changed,
                data,
                timestamp,
                eos,
                input_queue_flushed: false,
            });
        }
        self.notify.notify_one();
    }

    /// Pops the next packet without waiting.
    pub fn get_packet(&self) -> Option<InputPacket> {
        let packet = {
            let mut queue = self.queue.lock();
            let mut packet = queue.packets.pop_front()?;
            if queue.flushed {
                packet.input_queue_flushed = true;
                queue.flushed = false;
            }
            packet
        };
        self.space.notify_waiters();
        Some(packet)
    }

    /// Waits up to `timeout` for the next packet.
    ///
    /// Cancelling the returned future never loses a packet: packets are only removed from
    /// the queue synchronously, after the last await point.
    pub async fn next_packet(&self, timeout: Duration) -> Option<InputPacket> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(packet) = self.get_packet() {
                return Some(packet);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Waits until a push would not flush the queue.
    pub async fn wait_for_space(&self) {
        loop {
            let notified = self.space.notified();
            if self.queue_len() < self.max_queue_depth {
                return;
            }
            notified.await;
        }
    }

    /// Number of queued packets.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().packets.len()
    }

    /// Maximum number of queued packets.
    pub fn max_queue_depth(&self) -> usize {
        self.max_queue_depth
    }

    /// Metadata currently recorded for `stream_id`.
    pub fn current_sri(&self, stream_id: &str) -> Option<Sri> {
        self.queue
            .lock()
            .current_sri
            .get(stream_id)
            .map(|(sri, _)| sri.clone())
    }
}

/// Output side of the component.
pub struct OutFloatPort {
    name: String,
    active_sris: Mutex<HashMap<String, Sri>>,
    sender: broadcast::Sender<OutputEvent>,
}

impl OutFloatPort {
    /// Creates a port whose subscribers buffer up to `capacity` events.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            active_sris: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receives every event pushed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.sender.subscribe()
    }

    /// Metadata of every stream that has been announced and not yet ended.
    pub fn active_sris(&self) -> Vec<Sri> {
        self.active_sris.lock().values().cloned().collect()
    }

    fn send(&self, event: OutputEvent) {
        // No subscribers is not an error; the data is simply not observed.
        if self.sender.send(event).is_err() {
            debug!(port = %self.name, "No subscribers connected");
        }
    }
}

impl PacketSink for OutFloatPort {
    fn push_sri(&self, sri: &Sri) {
        self.active_sris
            .lock()
            .insert(sri.stream_id.clone(), sri.clone());
        self.send(OutputEvent::Sri(sri.clone()));
    }

    fn push_packet(&self, packet: OutputPacket) {
        let announce = {
            let mut active = self.active_sris.lock();
            let announce = if active.contains_key(&packet.stream_id) {
                None
            } else {
                let sri = Sri::new(packet.stream_id.clone());
                active.insert(packet.stream_id.clone(), sri.clone());
                Some(sri)
            };
            if packet.eos {
                active.remove(&packet.stream_id);
            }
            announce
        };
        if let Some(sri) = announce {
            warn!(
                port = %self.name,
                stream_id = %sri.stream_id,
                "Data pushed before metadata; announcing default metadata"
            );
            self.send(OutputEvent::Sri(sri));
        }
        self.send(OutputEvent::Packet(packet));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SampleMode;

    #[test]
    fn first_packet_of_stream_reports_sri_change() {
        let port = InFloatPort::new("dataFloat_in", 10);
        port.push_packet(vec![1.0], Utc::now(), false, "a");
        port.push_packet(vec![2.0], Utc::now(), false, "a");

        let first = port.get_packet().unwrap();
        let second = port.get_packet().unwrap();
        assert!(first.sri_changed);
        assert!(!second.sri_changed);
        assert_eq!(first.sri.mode, SampleMode::Real);
        assert!(port.get_packet().is_none());
    }

    #[test]
    fn pushed_sri_applies_to_next_packet() {
        let port = InFloatPort::new("dataFloat_in", 10);
        port.push_packet(vec![1.0], Utc::now(), false, "a");
        port.push_sri(Sri::new("a").with_mode(SampleMode::Complex));
        port.push_packet(vec![1.0, 0.0], Utc::now(), false, "a");
        port.push_packet(vec![1.0, 0.0], Utc::now(), false, "a");

        let _ = port.get_packet();
        let changed = port.get_packet().unwrap();
        let steady = port.get_packet().unwrap();
        assert!(changed.sri_changed);
        assert_eq!(changed.sri.mode, SampleMode::Complex);
        assert!(!steady.sri_changed);
        assert_eq!(steady.sri.mode, SampleMode::Complex);
    }

    #[test]
    fn eos_forgets_stream_metadata() {
        let port = InFloatPort::new("dataFloat_in", 10);
        port.push_sri(Sri::new("a").with_mode(SampleMode::Complex));
        port.push_packet(vec![1.0, 0.0], Utc::now(), true, "a");
        assert!(port.current_sri("a").is_none());

        port.push_packet(vec![1.0], Utc::now(), false, "a");
        let _ = port.get_packet();
        let reused = port.get_packet().unwrap();
        assert!(reused.sri_changed);
        assert_eq!(reused.sri.mode, SampleMode::Real);
    }

    #[test]
    fn overflow_flushes_and_flags_next_packet() {
        let port = InFloatPort::new("dataFloat_in", 2);
        port.push_packet(vec![1.0], Utc::now(), false, "a");
        port.push_packet(vec![2.0], Utc::now(), false, "a");
        port.push_packet(vec![3.0], Utc::now(), false, "a");
        assert_eq!(port.queue_len(), 1);

        let packet = port.get_packet().unwrap();
        assert_eq!(packet.data, vec![3.0]);
        assert!(packet.input_queue_flushed);

        port.push_packet(vec![4.0], Utc::now(), false, "a");
        assert!(!port.get_packet().unwrap().input_queue_flushed);
    }

    #[tokio::test]
    async fn next_packet_times_out_when_idle() {
        let port = InFloatPort::new("dataFloat_in", 2);
        assert!(port.next_packet(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn next_packet_wakes_on_push() {
        let port = std::sync::Arc::new(InFloatPort::new("dataFloat_in", 2));
        let producer = port.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.push_packet(vec![7.0], Utc::now(), false, "a");
        });

        let packet = port.next_packet(Duration::from_secs(5)).await.unwrap();
        assert_eq!(packet.data, vec![7.0]);
    }

    #[tokio::test]
    async fn producer_resumes_once_consumer_frees_a_slot() {
        let port = std::sync::Arc::new(InFloatPort::new("dataFloat_in", 1));
        port.push_packet(vec![1.0], Utc::now(), false, "a");

        let producer = port.clone();
        let waiter = tokio::spawn(async move {
            producer.wait_for_space().await;
            producer.push_packet(vec![2.0], Utc::now(), false, "a");
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert_eq!(port.get_packet().unwrap().data, vec![1.0]);

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("producer never woke")
            .unwrap();
        let next = port.get_packet().unwrap();
        assert_eq!(next.data, vec![2.0]);
        assert!(!next.input_queue_flushed);
    }

    #[test]
    fn out_port_announces_default_sri_before_orphan_data() {
        let port = OutFloatPort::new("dataFloat_out", 16);
        let mut rx = port.subscribe();

        port.push_packet(OutputPacket {
            stream_id: "a".into(),
            data: vec![1.0],
            timestamp: Utc::now(),
            eos: true,
        });

        assert!(matches!(rx.try_recv().unwrap(), OutputEvent::Sri(sri) if sri.stream_id == "a"));
        assert!(matches!(rx.try_recv().unwrap(), OutputEvent::Packet(p) if p.eos));
        assert!(port.active_sris().is_empty());
    }

    #[test]
    fn out_port_tracks_active_streams() {
        let port = OutFloatPort::new("dataFloat_out", 16);
        port.push_sri(&Sri::new("a"));
        port.push_sri(&Sri::new("b"));
        assert_eq!(port.active_sris().len(), 2);

        port.push_packet(OutputPacket {
            stream_id: "a".into(),
            data: vec![],
            timestamp: Utc::now(),
            eos: true,
        });
        let active = port.active_sris();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].stream_id, "b");
    }
}
