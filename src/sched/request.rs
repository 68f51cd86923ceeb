//! Block request value type
//!
//! A [`Request`] is the scheduler's whole view of an I/O operation: a sector
//! range plus an opaque identity that lets the host correlate dispatches and
//! merges with its own bookkeeping. Payloads, buffers, and completion
//! channels live with the host, never here.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sector-addressed offset into a device.
pub type Sector = u64;

/// Opaque identity correlating a scheduled request with the operation that
/// enqueued it. Meaningless to the scheduler beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique request identity.
pub fn next_request_id() -> RequestId {
    RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Immutable description of one I/O operation's sector range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    id: RequestId,
    start_sector: Sector,
    sectors: u64,
}

impl Request {
    /// `sectors` must be positive; a zero-length range has no place in the
    /// sweep order.
    pub fn new(id: RequestId, start_sector: Sector, sectors: u64) -> Self {
        debug_assert!(sectors > 0, "request {id} has no sectors");
        Self {
            id,
            start_sector,
            sectors,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn start_sector(&self) -> Sector {
        self.start_sector
    }

    pub fn sectors(&self) -> u64 {
        self.sectors
    }

    /// First sector past the serviced range; where the head lands after the
    /// transfer completes.
    pub fn end_sector(&self) -> Sector {
        self.start_sector.saturating_add(self.sectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_sector() {
        let req = Request::new(RequestId::new(1), 100, 8);
        assert_eq!(req.start_sector(), 100);
        assert_eq!(req.sectors(), 8);
        assert_eq!(req.end_sector(), 108);
    }

    #[test]
    fn test_id_allocation_is_unique() {
        let a = next_request_id();
        let b = next_request_id();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(RequestId::new(7).to_string(), "#7");
    }
}
