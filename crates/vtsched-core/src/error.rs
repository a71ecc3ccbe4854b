//! Error types for scheduler operations

use thiserror::Error;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that scheduler operations raise synchronously on the caller.
///
/// Submission rejection is deliberately *not* represented here: a rejected
/// submission is reported through `SubmitOutcome::Rejected` plus the
/// envelope's on-cancel hook, never as an error on the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Caller supplied an argument outside the accepted domain
    /// (NaN delay, zero max wait, etc.)
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An operation that must run on a worker thread was called elsewhere
    #[error("concurrent modification: {0}")]
    ConcurrentModification(&'static str),

    /// An operation that must not run on a worker thread was called on one
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// A blocking wait was interrupted before its condition held
    #[error("wait interrupted")]
    Interrupted,

    /// The platform refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SchedError::InvalidArgument("delay must be finite");
        assert_eq!(format!("{}", e), "invalid argument: delay must be finite");

        let e = SchedError::Interrupted;
        assert_eq!(format!("{}", e), "wait interrupted");
    }
}
