//! Per-record lifecycle
//!
//! `Raw -> Normalized -> (Rejected | Verified) -> Written`; `Raw` may also go
//! straight to `Rejected` when normalization fails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Record state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// As read from the dataset
    Raw,
    /// Fields canonicalized
    Normalized,
    /// Excluded from output (terminal)
    Rejected,
    /// Existence outcome recorded
    Verified,
    /// Handed to the writer (terminal)
    Written,
}

impl RecordState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Illegal lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal record transition {from} -> {to}")]
pub struct TransitionError {
    /// Current state
    pub from: RecordState,
    /// Requested state
    pub to: RecordState,
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RecordState) -> &'static [RecordState] {
    use RecordState::{Normalized, Raw, Rejected, Verified, Written};
    match from {
        Raw => &[Normalized, Rejected],
        Normalized => &[Rejected, Verified],
        Verified => &[Written],
        Rejected | Written => &[],
    }
}

/// Validate a single step
///
/// # Errors
/// [`TransitionError`] when `to` is not reachable from `from`.
pub fn validate_transition(from: RecordState, to: RecordState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// A record's position in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: RecordState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: RecordState::Raw,
        }
    }
}

impl Lifecycle {
    /// Start in `Raw`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    /// [`TransitionError`]; the state is left unchanged.
    pub fn advance(&mut self, to: RecordState) -> Result<(), TransitionError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}
