//! Per-stream state carried between batches.
use std::collections::HashMap;

/// What the processor remembers about one active stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamState {
    /// Whether the stream carries interleaved complex samples.
    pub is_complex: bool,
    /// Unwrapped value of the last sample emitted, if any batch with data was processed.
    pub last_value: Option<f32>,
}

/// State for every active stream, keyed by stream ID.
///
/// Owned exclusively by the processing task; nothing else writes to it.
#[derive(Debug, Default)]
pub struct StreamStateStore {
    streams: HashMap<String, StreamState>,
}

impl StreamStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `stream_id`, if the stream is known.
    pub fn get(&self, stream_id: &str) -> Option<&StreamState> {
        self.streams.get(stream_id)
    }

    /// Whether `stream_id` has recorded state.
    pub fn contains(&self, stream_id: &str) -> bool {
        self.streams.contains_key(stream_id)
    }

    /// Last unwrapped value of `stream_id`.
    pub fn last_value(&self, stream_id: &str) -> Option<f32> {
        self.streams.get(stream_id).and_then(|state| state.last_value)
    }

    /// Records the complex flag, creating the stream entry if needed.
    pub fn set_complex(&mut self, stream_id: &str, is_complex: bool) {
        match self.streams.get_mut(stream_id) {
            Some(state) => state.is_complex = is_complex,
            None => {
                self.streams.insert(
                    stream_id.to_string(),
                    StreamState {
                        is_complex,
                        last_value: None,
                    },
                );
            }
        }
    }

    /// Persists the last unwrapped value, creating the stream entry if needed.
    pub fn set_last_value(&mut self, stream_id: &str, value: f32) {
        self.streams
            .entry(stream_id.to_string())
            .or_default()
            .last_value = Some(value);
    }

    /// Forgets one stream. Returns the state it had.
    pub fn remove(&mut self, stream_id: &str) -> Option<StreamState> {
        self.streams.remove(stream_id)
    }

    /// Forgets every stream.
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    /// Number of known streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is known.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_flag_updates_in_place() {
        let mut store = StreamStateStore::new();
        store.set_complex("a", true);
        store.set_last_value("a", 4.0);
        store.set_complex("a", false);

        let state = store.get("a").unwrap();
        assert!(!state.is_complex);
        assert_eq!(state.last_value, Some(4.0));
    }

    #[test]
    fn last_value_without_flag_defaults_to_real() {
        let mut store = StreamStateStore::new();
        store.set_last_value("b", 1.0);
        assert_eq!(store.get("b"), Some(&StreamState { is_complex: false, last_value: Some(1.0) }));
    }

    #[test]
    fn remove_and_clear() {
        let mut store = StreamStateStore::new();
        store.set_complex("a", false);
        store.set_complex("b", true);
        assert_eq!(store.len(), 2);

        assert!(store.remove("a").is_some());
        assert!(!store.contains("a"));
        assert_eq!(store.last_value("a"), None);

        store.clear();
        assert!(store.is_empty());
    }
}
