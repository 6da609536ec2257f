//! Errors shared by every fake.
//!
//! TigerStyle: one error type, explicit variants. "Not found" is never an
//! error here: it is a `None`, a `false`, an empty list or a 404 response.

use crate::constants::FAULT_DEFAULT_MESSAGE;

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by fault policies and fakes
#[derive(Debug, thiserror::Error)]
pub enum FakeError {
    /// A required argument was missing or empty
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The fault policy failed the call without a custom error
    #[error("{}", FAULT_DEFAULT_MESSAGE)]
    FaultTriggered,

    /// The fault policy failed the call with a caller-supplied error
    #[error(transparent)]
    Injected(anyhow::Error),

    /// The cancellation token fired
    #[error("operation was cancelled")]
    Cancelled,

    /// Upload content could not be read
    #[error("failed to read content: {0}")]
    Io(#[from] std::io::Error),
}

impl FakeError {
    /// Build an invalid-argument error.
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// True for errors produced by a fault policy (generic or injected).
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::FaultTriggered | Self::Injected(_))
    }

    /// True when the operation was aborted through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for argument validation failures.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Result alias used throughout the crate
pub type FakeResult<T> = Result<T, FakeError>;

// =============================================================================
// Tests
// =============================================================================
