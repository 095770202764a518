use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Receiver of store timing samples, in milliseconds.
pub trait StoreMetrics: Send {
    fn note_write_duration(&self, ms: u32);

    fn note_read_duration(&self, ms: u32);
}

/// Discards every sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {
    fn note_write_duration(&self, _ms: u32) {}

    fn note_read_duration(&self, _ms: u32) {}
}

#[derive(Debug, Default)]
struct Samples {
    writes: Vec<u32>,
    reads: Vec<u32>,
}

/// Keeps every sample. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct RecordingMetrics {
    samples: Arc<Mutex<Samples>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<u32> {
        self.samples.lock().expect("lock poisoned").writes.clone()
    }

    pub fn reads(&self) -> Vec<u32> {
        self.samples.lock().expect("lock poisoned").reads.clone()
    }
}

impl StoreMetrics for RecordingMetrics {
    fn note_write_duration(&self, ms: u32) {
        self.samples.lock().expect("lock poisoned").writes.push(ms);
    }

    fn note_read_duration(&self, ms: u32) {
        self.samples.lock().expect("lock poisoned").reads.push(ms);
    }
}

/// Whole milliseconds of `d`, or `None` if that does not fit a sample.
pub fn duration_ms(d: Duration) -> Option<u32> {
    u32::try_from(d.as_millis()).ok()
}
