//! Error types for connection pooling

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Core error type for pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Initialization failure: {0}")]
    Initialization(String),

    #[error("Acquisition failure: {0}")]
    Acquisition(#[from] AcquireError),

    #[error("Release failure: {0}")]
    Release(#[from] ReleaseError),

    #[error("Destroy failure: {} handle(s) failed to close: {}", .0.len(), CloseFailures(.0))]
    Destroy(Vec<CloseFailure>),

    #[error("Handle error: {0}")]
    Handle(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl PoolError {
    /// Whether retrying the failed operation can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PoolError::Acquisition(
                AcquireError::Cancelled | AcquireError::TimedOut(_) | AcquireError::Exhausted
            )
        )
    }
}

/// Why an acquire did not hand out a connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("wait for a connection was cancelled")]
    Cancelled,

    #[error("timed out after {0:?} waiting for a connection")]
    TimedOut(Duration),

    #[error("no connection available")]
    Exhausted,

    #[error("pool is closed")]
    Closed,

    #[error("could not replace stale connection in slot {slot}: {reason}")]
    Stale { slot: usize, reason: String },
}

/// Why a connection could not be returned to the pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("connection in slot {slot} was already released")]
    AlreadyReleased { slot: usize },

    #[error("available set already holds all {capacity} connections")]
    AvailableFull { capacity: usize },

    #[error("connection in slot {slot} could not be reset: {reason}")]
    Reset { slot: usize, reason: String },
}

/// A handle that failed to close during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    pub slot: usize,
    pub reason: String,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}: {}", self.slot, self.reason)
    }
}

struct CloseFailures<'a>(&'a [CloseFailure]);

impl fmt::Display for CloseFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
