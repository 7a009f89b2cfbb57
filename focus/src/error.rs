//! Error taxonomy shared by every task and session operation.

use crate::store::StoreError;

/// Errors surfaced to callers of the task and session operations.
///
/// `InvalidInput` and `NotFound` are terminal. `StoreUnavailable` is
/// transient; the caller decides whether and when to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FocusError {
    /// Empty or malformed text, non-positive minutes, bad settings.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unknown id, or an id owned by someone else.
    #[error("not found: {0}")]
    NotFound(String),
    /// The store could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// No owner identity was supplied.
    #[error("no owner identity")]
    Unauthenticated,
}

impl FocusError {
    /// Returns `true` if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for FocusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(reason) => Self::InvalidInput(reason),
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            StoreError::Unauthenticated => Self::Unauthenticated,
        }
    }
}
