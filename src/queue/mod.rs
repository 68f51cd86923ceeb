//! Async request queue
//!
//! The host-facing layer around the scheduler core: accepts reads and writes,
//! merges adjacent submissions, and pumps dispatched requests into a
//! [`crate::device::BlockDevice`].

pub mod adapter;

pub use adapter::{RequestQueue, MAX_MERGE_SECTORS};
