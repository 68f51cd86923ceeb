//! sweepq - LOOK-discipline block request scheduling
//!
//! Features:
//! - Elevator (LOOK) dispatch over a sector-ordered pending store
//! - Async request queue with back-merge of adjacent transfers
//! - Encrypted RAM disk backend for exercising the scheduler

pub mod device;
pub mod queue;
pub mod sched;
