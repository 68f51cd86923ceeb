//! Sector-ordered pending request store
//!
//! Requests are keyed by (start_sector, arrival sequence) in a B-tree so the
//! sweep can find the nearest candidate on either side of the head in
//! O(log n), while equal start sectors keep first-in-first-out order. A side
//! index by identity backs removal and neighbor queries without scanning.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use super::error::{SchedError, SchedResult};
use super::request::{Request, RequestId, Sector};

/// Ordering key: sector first, then arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SectorKey {
    sector: Sector,
    seq: u64,
}

impl SectorKey {
    /// Lowest possible key at `sector`.
    fn first(sector: Sector) -> Self {
        Self { sector, seq: 0 }
    }

    /// Highest possible key at `sector`.
    fn last(sector: Sector) -> Self {
        Self {
            sector,
            seq: u64::MAX,
        }
    }
}

/// Pending set for one scheduler instance. Not synchronized; the owner
/// serializes access.
pub struct PendingStore {
    by_sector: BTreeMap<SectorKey, Request>,
    by_id: HashMap<RequestId, SectorKey>,
    next_seq: u64,
}

impl PendingStore {
    pub fn new() -> Self {
        Self {
            by_sector: BTreeMap::new(),
            by_id: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Adds a request to the pending set. Identities must be unique among
    /// pending entries; equal start sectors are allowed and keep arrival
    /// order.
    pub fn insert(&mut self, request: Request) {
        let key = SectorKey {
            sector: request.start_sector(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let prev = self.by_id.insert(request.id(), key);
        debug_assert!(prev.is_none(), "identity {} inserted twice", request.id());
        self.by_sector.insert(key, request);
    }

    /// Removes the request with the given identity, returning it.
    pub fn remove(&mut self, id: RequestId) -> SchedResult<Request> {
        let key = self.key_of(id)?;
        self.by_id.remove(&id);
        // the index and the tree move in lockstep
        self.by_sector.remove(&key).ok_or(SchedError::NotFound(id))
    }

    /// Pending request with the smallest start sector at or after `sector`.
    /// Ties on sector resolve to the earliest-inserted entry.
    pub fn nearest_at_or_after(&self, sector: Sector) -> Option<&Request> {
        self.by_sector
            .range(SectorKey::first(sector)..)
            .next()
            .map(|(_, req)| req)
    }

    /// Pending request with the largest start sector at or before `sector`.
    /// Ties on sector resolve to the earliest-inserted entry.
    pub fn nearest_at_or_before(&self, sector: Sector) -> Option<&Request> {
        let winner = self
            .by_sector
            .range(..=SectorKey::last(sector))
            .next_back()?
            .0
            .sector;
        // several entries may share the winning sector; arrival order picks
        self.by_sector
            .range(SectorKey::first(winner)..=SectorKey::last(winner))
            .next()
            .map(|(_, req)| req)
    }

    /// Entry immediately before `id` in sector order, if any.
    pub fn neighbor_before(&self, id: RequestId) -> SchedResult<Option<&Request>> {
        let key = self.key_of(id)?;
        Ok(self
            .by_sector
            .range(..key)
            .next_back()
            .map(|(_, req)| req))
    }

    /// Entry immediately after `id` in sector order, if any.
    pub fn neighbor_after(&self, id: RequestId) -> SchedResult<Option<&Request>> {
        let key = self.key_of(id)?;
        Ok(self
            .by_sector
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(_, req)| req))
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_sector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sector.is_empty()
    }

    /// Pending requests in sector order.
    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.by_sector.values()
    }

    fn key_of(&self, id: RequestId) -> SchedResult<SectorKey> {
        self.by_id.get(&id).copied().ok_or(SchedError::NotFound(id))
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new()
    }
}
