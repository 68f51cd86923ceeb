//! LOOK dispatch state machine
//!
//! Services pending requests in sector order, sweeping in one direction until
//! nothing remains ahead of the head, then reversing. Direction is sticky
//! within a sweep: a closer request behind the head never preempts forward
//! progress, which keeps a stream of arrivals on one side from starving the
//! other.
//!
//! # Architecture
//!
//! ```text
//! LookScheduler
//!       │ insert / remove / notify_merge
//!       ├─> PendingStore (sector-ordered, FIFO among equals)
//!       │
//!       │ dispatch
//!       └─> nearest candidate in sweep direction
//!           reverse on exhaustion, idle posture when drained
//! ```

use std::sync::Arc;

use tracing::{debug, trace};

use super::error::{SchedError, SchedResult};
use super::request::{Request, RequestId, Sector};
use super::stats::{SchedStats, SchedStatsSnapshot};
use super::store::PendingStore;

// ============================================================================
// SweepDirection
// ============================================================================

/// Sweep direction across sector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    /// Ascending sector numbers
    Forward,
    /// Descending sector numbers
    Backward,
}

impl SweepDirection {
    pub fn reversed(self) -> Self {
        match self {
            SweepDirection::Forward => SweepDirection::Backward,
            SweepDirection::Backward => SweepDirection::Forward,
        }
    }

    /// Head posture that puts the whole address space ahead of the next
    /// sweep in this direction.
    fn rest_position(self) -> Sector {
        match self {
            SweepDirection::Forward => 0,
            SweepDirection::Backward => Sector::MAX,
        }
    }
}

// ============================================================================
// LookScheduler
// ============================================================================

/// Single-queue LOOK scheduler.
///
/// Owns the pending set and the head/direction state. Not synchronized; the
/// host serializes access behind its queue lock.
pub struct LookScheduler {
    /// Pending requests in sector order
    store: PendingStore,
    /// Where the head will be once the in-flight transfer finishes
    head: Sector,
    /// Current sweep direction
    direction: SweepDirection,
    /// Set when a dispatch found the store drained; cleared by the next
    /// non-empty dispatch. Bounds the idle reset to once per quiet period.
    idle: bool,
    /// Shared counters
    stats: Arc<SchedStats>,
}

impl LookScheduler {
    /// Create a scheduler with the head parked at sector 0, sweeping forward.
    pub fn new() -> Self {
        Self::with_stats(Arc::new(SchedStats::new()))
    }

    /// Create a scheduler recording into shared counters.
    pub fn with_stats(stats: Arc<SchedStats>) -> Self {
        Self {
            store: PendingStore::new(),
            head: 0,
            direction: SweepDirection::Forward,
            idle: false,
            stats,
        }
    }

    /// Accept a request into the pending set. Never reorders or drops
    /// anything already pending.
    pub fn insert(&mut self, request: Request) {
        trace!(
            id = %request.id(),
            sector = request.start_sector(),
            sectors = request.sectors(),
            "request queued"
        );
        self.store.insert(request);
        self.stats.record_insert();
    }

    /// Withdraw a pending request, e.g. when the submitter cancels.
    pub fn remove(&mut self, id: RequestId) -> SchedResult<Request> {
        let request = self.store.remove(id)?;
        trace!(id = %id, "request withdrawn");
        Ok(request)
    }

    /// Hand out the next request under the LOOK discipline.
    ///
    /// Picks the nearest pending request in the current direction; if the
    /// current side is exhausted, reverses once and serves the other side.
    /// The chosen request leaves the pending set and the head advances to
    /// the end of its range.
    ///
    /// Returns `None` only when nothing is pending. The first drained
    /// dispatch after service also flips the direction and parks the head,
    /// so the next burst starts a fresh sweep on the opposite side.
    pub fn dispatch(&mut self) -> Option<Request> {
        if self.store.is_empty() {
            if !self.idle {
                self.idle = true;
                self.direction = self.direction.reversed();
                self.head = self.direction.rest_position();
                self.stats.record_idle_reset();
                debug!(direction = ?self.direction, "queue drained, head parked");
            }
            return None;
        }
        self.idle = false;

        let chosen = match self.candidate_in(self.direction) {
            Some(req) => req,
            None => {
                // this side is exhausted, serve the other one
                self.direction = self.direction.reversed();
                self.stats.record_sweep();
                debug!(direction = ?self.direction, head = self.head, "sweep reversed");
                self.candidate_in(self.direction)?
            }
        };

        let seek = chosen.start_sector().abs_diff(self.head);
        // the candidate was just read out of the store under the same borrow
        let dispatched = self.store.remove(chosen.id()).ok()?;
        self.head = dispatched.end_sector();
        self.stats.record_dispatch(seek);
        trace!(
            id = %dispatched.id(),
            sector = dispatched.start_sector(),
            seek,
            head = self.head,
            "request dispatched"
        );
        Some(dispatched)
    }

    /// Drop the absorbed half of a merge. The surviving request stays
    /// pending, widened on the host side; the store only forgets `absorbed`.
    /// Equal identities are a degenerate merge and leave the set unchanged.
    pub fn notify_merge(&mut self, surviving: RequestId, absorbed: RequestId) -> SchedResult<()> {
        // verify both identities before touching anything
        if !self.store.contains(surviving) {
            return Err(SchedError::NotFound(surviving));
        }
        if surviving == absorbed {
            // nothing was absorbed; removing here would drop a live request
            return Ok(());
        }
        let dropped = self.store.remove(absorbed)?;
        self.stats.record_merge();
        trace!(
            surviving = %surviving,
            absorbed = %dropped.id(),
            "merged request dropped"
        );
        Ok(())
    }

    /// Pending request immediately before `id` in sector order.
    pub fn former(&self, id: RequestId) -> SchedResult<Option<&Request>> {
        self.store.neighbor_before(id)
    }

    /// Pending request immediately after `id` in sector order.
    pub fn latter(&self, id: RequestId) -> SchedResult<Option<&Request>> {
        self.store.neighbor_after(id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.store.contains(id)
    }

    pub fn pending(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn head_position(&self) -> Sector {
        self.head
    }

    pub fn direction(&self) -> SweepDirection {
        self.direction
    }

    /// Shared counter handle, readable without the queue lock.
    pub fn stats(&self) -> Arc<SchedStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> SchedStatsSnapshot {
        self.stats.snapshot()
    }

    fn candidate_in(&self, direction: SweepDirection) -> Option<Request> {
        let found = match direction {
            SweepDirection::Forward => self.store.nearest_at_or_after(self.head),
            SweepDirection::Backward => self.store.nearest_at_or_before(self.head),
        };
        found.copied()
    }
}

impl Default for LookScheduler {
    fn default() -> Self {
        Self::new()
    }
}
