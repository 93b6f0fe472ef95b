// src/worker/mod.rs
//! Long-running loops. Each loop exposes a synchronous-per-call cycle
//! (`run_cycle`, `enqueue_due_fetches`, `cleanup`) so tests can drive it
//! without waiting on wall-clock timers.

pub mod dispatcher;
pub mod scheduler;

use std::time::Duration;
use tokio::sync::watch;

pub use dispatcher::{CycleReport, Dispatcher, DispatcherConfig};
pub use scheduler::{CleanupReport, ScheduleReport, Scheduler, SchedulerConfig};

/// Sender half: flips the shared flag once.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left means nothing to stop.
        let _ = self.tx.send(true);
    }
}

/// Receiver half handed to each loop. Stopping only affects the waits between
/// cycles; a stage already running is allowed to finish.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `d`, waking early on shutdown. Returns true if the loop should stop.
    pub async fn sleep(&mut self, d: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(d) => {}
            // A dropped trigger counts as a stop request.
            _ = self.rx.changed() => return true,
        }
        self.is_triggered()
    }
}
