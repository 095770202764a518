use std::collections::HashMap;
use std::time::Duration;

use confstore_store::{AlarmHandle, AlarmScheduler};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::service::Command;

/// [`AlarmScheduler`] backed by tokio timers.
///
/// A fire is delivered as a command on the service channel, so it is
/// handled in order with every other store call. Timers hold only a weak
/// sender and never keep the service alive.
pub struct TokioAlarmScheduler {
    tx: mpsc::WeakUnboundedSender<Command>,
    timers: HashMap<AlarmHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioAlarmScheduler {
    pub(crate) fn new(tx: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            tx,
            timers: HashMap::new(),
            next_id: 0,
        }
    }
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn schedule(&mut self, tag: &'static str, delay: Duration) -> AlarmHandle {
        self.timers.retain(|_, timer| !timer.is_finished());
        self.next_id += 1;
        let handle = AlarmHandle::new(self.next_id);
        let tx = self.tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                trace!(tag, alarm = handle.id(), "alarm fired");
                let _ = tx.send(Command::AlarmFired(handle));
            }
        });
        self.timers.insert(handle, timer);
        handle
    }

    fn cancel(&mut self, handle: AlarmHandle) {
        if let Some(timer) = self.timers.remove(&handle) {
            timer.abort();
        }
    }
}

impl Drop for TokioAlarmScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}
