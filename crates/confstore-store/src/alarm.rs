//! The debounce alarm collaborator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tag of the alarm armed for buffered writes.
pub const WRITE_BUFFER_ALARM_TAG: &str = "WriteBufferAlarm";

/// Identifies one scheduled alarm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmHandle(u64);

impl AlarmHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// One-shot timers measured on a monotonic clock.
///
/// A scheduler never calls into the store. Whoever hosts the store delivers
/// a fire by passing the handle to [`ConfigStore::on_alarm`] on the same
/// execution context as every other store call. Each alarm fires at most
/// once; cancelling an unknown or already fired handle is a no-op.
///
/// [`ConfigStore::on_alarm`]: crate::ConfigStore::on_alarm
pub trait AlarmScheduler: Send {
    fn schedule(&mut self, tag: &'static str, delay: Duration) -> AlarmHandle;

    fn cancel(&mut self, handle: AlarmHandle);
}

/// An alarm scheduled on a [`ManualAlarmScheduler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledAlarm {
    pub handle: AlarmHandle,
    pub tag: &'static str,
    pub delay: Duration,
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    pending: Vec<ScheduledAlarm>,
    scheduled: usize,
    cancelled: usize,
}

/// Scheduler whose alarms fire only when a test says so.
///
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ManualAlarmScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualAlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alarms scheduled and neither fired nor cancelled.
    pub fn pending(&self) -> Vec<ScheduledAlarm> {
        self.state.lock().expect("lock poisoned").pending.clone()
    }

    pub fn is_armed(&self) -> bool {
        !self.state.lock().expect("lock poisoned").pending.is_empty()
    }

    /// Remove the oldest pending alarm and return its handle, to be passed
    /// to the store.
    pub fn fire_next(&self) -> Option<AlarmHandle> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.pending.is_empty() {
            return None;
        }
        Some(state.pending.remove(0).handle)
    }

    /// Number of `schedule` calls so far.
    pub fn scheduled_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").scheduled
    }

    /// Number of `cancel` calls that removed a pending alarm.
    pub fn cancelled_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").cancelled
    }
}

impl AlarmScheduler for ManualAlarmScheduler {
    fn schedule(&mut self, tag: &'static str, delay: Duration) -> AlarmHandle {
        let mut state = self.state.lock().expect("lock poisoned");
        state.next_id += 1;
        let handle = AlarmHandle::new(state.next_id);
        state.pending.push(ScheduledAlarm { handle, tag, delay });
        state.scheduled += 1;
        handle
    }

    fn cancel(&mut self, handle: AlarmHandle) {
        let mut state = self.state.lock().expect("lock poisoned");
        let before = state.pending.len();
        state.pending.retain(|a| a.handle != handle);
        if state.pending.len() != before {
            state.cancelled += 1;
        }
    }
}
