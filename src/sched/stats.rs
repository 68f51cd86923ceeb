//! Scheduler counters
//!
//! Lock-free counters for observing sweep behavior. Shared by handle so the
//! host can read them without taking the queue lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one scheduler instance
#[derive(Debug)]
pub struct SchedStats {
    /// Requests accepted into the pending set
    pub inserted: AtomicU64,
    /// Requests handed out by dispatch
    pub dispatched: AtomicU64,
    /// Requests absorbed by a merge
    pub merged: AtomicU64,
    /// Direction reversals while work was pending
    pub sweeps: AtomicU64,
    /// Transitions into the idle posture
    pub idle_resets: AtomicU64,
    /// Cumulative head travel at dispatch, in sectors
    pub seek_sectors: AtomicU64,
}

impl SchedStats {
    pub const fn new() -> Self {
        Self {
            inserted: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            merged: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            idle_resets: AtomicU64::new(0),
            seek_sectors: AtomicU64::new(0),
        }
    }

    /// Record an accepted request
    pub fn record_insert(&self) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatch and the head travel it cost
    pub fn record_dispatch(&self, seek: u64) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.seek_sectors.fetch_add(seek, Ordering::Relaxed);
    }

    /// Record a request absorbed by a merge
    pub fn record_merge(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a direction reversal during a sweep
    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transition into the idle posture
    pub fn record_idle_reset(&self) {
        self.idle_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Average head travel per dispatch, in sectors
    pub fn average_seek(&self) -> f64 {
        let dispatched = self.dispatched.load(Ordering::Relaxed);
        if dispatched == 0 {
            return 0.0;
        }
        self.seek_sectors.load(Ordering::Relaxed) as f64 / dispatched as f64
    }

    /// Take a snapshot of current counters
    pub fn snapshot(&self) -> SchedStatsSnapshot {
        SchedStatsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            idle_resets: self.idle_resets.load(Ordering::Relaxed),
            seek_sectors: self.seek_sectors.load(Ordering::Relaxed),
            avg_seek_sectors: self.average_seek(),
        }
    }
}

impl Default for SchedStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of scheduler counters
#[derive(Debug, Clone)]
pub struct SchedStatsSnapshot {
    pub inserted: u64,
    pub dispatched: u64,
    pub merged: u64,
    pub sweeps: u64,
    pub idle_resets: u64,
    pub seek_sectors: u64,
    pub avg_seek_sectors: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = SchedStats::new();

        stats.record_insert();
        stats.record_insert();
        stats.record_dispatch(50);
        stats.record_dispatch(150);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.inserted, 2);
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(snapshot.seek_sectors, 200);
        assert_eq!(snapshot.avg_seek_sectors, 100.0);
    }

    #[test]
    fn test_average_seek_with_no_dispatches() {
        let stats = SchedStats::new();
        assert_eq!(stats.average_seek(), 0.0);
    }
}
