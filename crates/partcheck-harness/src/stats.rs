//! Run counters: shared by the generator and both validators.
//!
//! Every field only ever grows, through atomic increments, for the life of
//! one run. Snapshots read each counter independently; the verdict is
//! statistical, so a snapshot that is slightly inconsistent across counters
//! is acceptable.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// One of the two receive paths traffic comes back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RxPath {
    Path0,
    Path1,
}

impl RxPath {
    pub const ALL: [RxPath; 2] = [RxPath::Path0, RxPath::Path1];

    pub fn index(self) -> usize {
        match self {
            RxPath::Path0 => 0,
            RxPath::Path1 => 1,
        }
    }
}

impl fmt::Display for RxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    sent: AtomicU64,
    received_total: AtomicU64,
    received: [AtomicU64; 2],
    broken: AtomicU64,
    foreign: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one arrival on either path, whatever it turns out to be.
    /// Returns the new total.
    pub fn record_arrival(&self) -> u64 {
        self.received_total.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_valid(&self, path: RxPath) {
        self.received[path.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broken(&self) {
        self.broken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_foreign(&self) {
        self.foreign.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received_total: self.received_total.load(Ordering::Relaxed),
            received_path0: self.received[0].load(Ordering::Relaxed),
            received_path1: self.received[1].load(Ordering::Relaxed),
            broken: self.broken.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub sent: u64,
    /// Every arrival on either path, valid or not.
    pub received_total: u64,
    pub received_path0: u64,
    pub received_path1: u64,
    /// Arrivals whose header tag did not match.
    pub broken: u64,
    /// Arrivals whose framing could not be walked to a transport payload.
    pub foreign: u64,
}

impl CounterSnapshot {
    /// Valid arrivals across both paths.
    pub fn received(&self) -> u64 {
        self.received_path0 + self.received_path1
    }

    pub fn on(&self, path: RxPath) -> u64 {
        match path {
            RxPath::Path0 => self.received_path0,
            RxPath::Path1 => self.received_path1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_methods_return_running_totals() {
        let c = Counters::new();
        assert_eq!(c.record_sent(), 1);
        assert_eq!(c.record_sent(), 2);
        assert_eq!(c.record_arrival(), 1);
    }

    #[test]
    fn snapshot_reflects_each_counter() {
        let c = Counters::new();
        c.record_sent();
        c.record_sent();
        c.record_sent();
        c.record_arrival();
        c.record_valid(RxPath::Path0);
        c.record_arrival();
        c.record_valid(RxPath::Path1);
        c.record_arrival();
        c.record_broken();
        c.record_arrival();
        c.record_foreign();

        let s = c.snapshot();
        assert_eq!(s.sent, 3);
        assert_eq!(s.received_total, 4);
        assert_eq!(s.received(), 2);
        assert_eq!(s.on(RxPath::Path0), 1);
        assert_eq!(s.on(RxPath::Path1), 1);
        assert_eq!(s.broken, 1);
        assert_eq!(s.foreign, 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;

        let c = Counters::new();
        std::thread::scope(|s| {
            for t in 0..THREADS {
                let c = &c;
                s.spawn(move || {
                    let path = RxPath::ALL[(t % 2) as usize];
                    for _ in 0..PER_THREAD {
                        c.record_sent();
                        c.record_arrival();
                        c.record_valid(path);
                    }
                });
            }
        });

        let snap = c.snapshot();
        assert_eq!(snap.sent, THREADS * PER_THREAD);
        assert_eq!(snap.received_total, THREADS * PER_THREAD);
        assert_eq!(snap.received_path0, THREADS / 2 * PER_THREAD);
        assert_eq!(snap.received_path1, THREADS / 2 * PER_THREAD);
    }

    #[test]
    fn path_display_is_its_index() {
        assert_eq!(RxPath::Path0.to_string(), "0");
        assert_eq!(RxPath::Path1.to_string(), "1");
    }
}
