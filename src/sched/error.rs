//! Scheduler error types

use thiserror::Error;

use super::request::RequestId;

/// Scheduler operation errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The identity is not in the pending store. Removing or merging a
    /// request that was never inserted, or was already dispatched, is a
    /// caller bookkeeping bug and is reported rather than papered over.
    #[error("request {0} is not pending")]
    NotFound(RequestId),
}

pub type SchedResult<T> = Result<T, SchedError>;
