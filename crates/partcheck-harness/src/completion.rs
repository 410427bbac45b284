//! Completion signal: wakes the controlling task once, when enough samples
//! have been observed.
//!
//! Any number of validators may race past the threshold; the compare-and-set
//! on `fired` lets exactly one of them deliver the wake-up. `Notify` keeps a
//! permit if nobody is waiting yet, so a signal that lands before `wait` is
//! called is not lost.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Completion {
    fired: AtomicBool,
    notify: Notify,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns true only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.notify.notify_one();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal has fired. Returns immediately if it already has.
    pub async fn wait(&self) {
        if self.is_fired() {
            return;
        }
        self.notify.notified().await;
    }
}
