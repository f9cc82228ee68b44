//! Store fault taxonomy
//!
//! "Not found" is a successful answer, not a fault. Faults are split by what
//! an operator has to do about them:
//! - access denied: fix credentials or policy
//! - transient: retry later
//! - other: inspect the message

use serde::{Deserialize, Serialize};

/// Fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Authorization failure
    AccessDenied,
    /// Connectivity, throttling, timeout
    Transient,
    /// Anything else
    Other,
}

/// A store probe failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} store fault: {message}")]
pub struct StoreFault {
    /// Classification
    pub kind: FaultKind,
    /// Store-provided detail
    pub message: String,
}

impl StoreFault {
    /// Create fault
    #[inline]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Authorization failure
    #[inline]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(FaultKind::AccessDenied, message)
    }

    /// Retryable failure
    #[inline]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transient, message)
    }

    /// Unclassified failure
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Other, message)
    }

    /// Check if fault is worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == FaultKind::Transient
    }

    /// Check if fault is an authorization failure
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.kind == FaultKind::AccessDenied
    }

    /// Classify an I/O error from a filesystem-backed store
    #[must_use]
    pub fn from_io(context: &str, error: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        let message = format!("{context}: {error}");
        match error.kind() {
            ErrorKind::PermissionDenied => Self::access_denied(message),
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                Self::transient(message)
            }
            _ => Self::other(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn only_transient_is_retryable() {
        assert!(StoreFault::transient("throttled").is_retryable());
        assert!(!StoreFault::access_denied("403").is_retryable());
        assert!(!StoreFault::other("boom").is_retryable());
    }

    #[test]
    fn io_errors_are_classified() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(StoreFault::from_io("txt/1.00000.txt", &denied).is_access_denied());

        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(StoreFault::from_io("x", &timeout).is_retryable());

        let other = io::Error::new(io::ErrorKind::InvalidData, "bad");
        assert_eq!(StoreFault::from_io("x", &other).kind, FaultKind::Other);
    }
}
