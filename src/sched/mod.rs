//! LOOK-discipline request scheduler core
//!
//! The scheduler decides service order, nothing else: it owns a pending set
//! ordered by start sector and a head/direction state machine, and hands out
//! one request per dispatch. Payload movement, merging of buffers, and
//! completion signalling belong to the queue adapter in [`crate::queue`].
//!
//! All operations run in O(log n) or better and none of them block; hosts
//! call them under a single per-queue lock.

pub mod elevator;
pub mod error;
pub mod request;
pub mod stats;
pub mod store;

pub use elevator::{LookScheduler, SweepDirection};
pub use error::{SchedError, SchedResult};
pub use request::{next_request_id, Request, RequestId, Sector};
pub use stats::{SchedStats, SchedStatsSnapshot};
pub use store::PendingStore;
