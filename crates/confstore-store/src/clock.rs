use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source used to measure read and write durations.
pub trait Clock: Send {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Default)]
struct ManualTime {
    now: Duration,
    step: Duration,
}

/// Clock that only moves when told to.
///
/// With a step set, every reading advances the clock by that step, so a
/// measured operation appears to take `step`.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    time: Arc<Mutex<ManualTime>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.time.lock().expect("lock poisoned").now += by;
    }

    pub fn set_step(&self, step: Duration) {
        self.time.lock().expect("lock poisoned").step = step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let mut time = self.time.lock().expect("lock poisoned");
        let now = time.now;
        let step = time.step;
        time.now += step;
        now
    }
}
