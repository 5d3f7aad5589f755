//! Error types surfaced by store operations.
//!
//! Every variant carries a message meant to be shown to the user as-is.
//! Nothing here is fatal; callers recover at the boundary and the user
//! re-invokes the action.

use crate::services::notify::NotifyError;
use crate::services::persistence::PersistError;

/// Stable category of a [`StoreError`], for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DomainMismatch,
    Verification,
    InvalidState,
    NotificationFailure,
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing or malformed input (nickname, college selection, email format).
    #[error("{0}")]
    Validation(String),
    /// Email domain does not belong to the selected college.
    #[error("{0}")]
    DomainMismatch(String),
    /// Code mismatch, or no live code to compare against.
    #[error("{0}")]
    Verification(String),
    /// Operation not allowed in the current state.
    #[error("{0}")]
    InvalidState(String),
    #[error("notification failed: {0}")]
    NotificationFailure(#[from] NotifyError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistError),
}

impl StoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DomainMismatch(_) => ErrorKind::DomainMismatch,
            Self::Verification(_) => ErrorKind::Verification,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotificationFailure(_) => ErrorKind::NotificationFailure,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn verification(msg: impl Into<String>) -> Self {
        Self::Verification(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
