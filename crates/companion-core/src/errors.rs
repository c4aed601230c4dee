//! Unified error system for the companion core
//!
//! A single error enum covers every failure the orchestration layer can
//! observe from its collaborators. None of these errors is ever shown to the
//! user; they are logged and mapped to a safe fallback by the caller.

use serde::{Deserialize, Serialize};

/// Failure reported by a collaborator of the orchestration core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CompanionError {
    /// Rejected input, e.g. a malformed configuration value
    #[error("Invalid: {message}")]
    Invalid {
        /// What was rejected
        message: String,
    },

    /// A session, candidate or file that does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// Backend unreachable or the request timed out
    #[error("Network error: {message}")]
    Network {
        /// Transport detail
        message: String,
    },

    /// Local persistence (settings, feedback queue) failed
    #[error("Storage error: {message}")]
    Storage {
        /// Store detail
        message: String,
    },

    /// The operation observed a cancellation request and stopped
    #[error("Cancelled: {message}")]
    Cancelled {
        /// What was cancelled
        message: String,
    },

    /// Anything else; indicates a bug in a collaborator
    #[error("Internal error: {message}")]
    Internal {
        /// Free-form detail
        message: String,
    },
}

impl CompanionError {
    /// [`CompanionError::Invalid`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// [`CompanionError::NotFound`]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// [`CompanionError::Network`]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// [`CompanionError::Storage`]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// [`CompanionError::Cancelled`]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// [`CompanionError::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry of the same operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Storage { .. })
    }

    /// Whether this error only reports an observed cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result alias used by every service contract
pub type CompanionResult<T> = std::result::Result<T, CompanionError>;

impl From<std::io::Error> for CompanionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::Interrupted => Self::cancelled(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CompanionError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = CompanionError::invalid("test message");
        assert!(matches!(err, CompanionError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: test message");
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CompanionError::from(io_err);
        assert!(matches!(err, CompanionError::NotFound { .. }));
    }

    #[test]
    fn transient_and_cancelled_classification() {
        assert!(CompanionError::network("offline").is_transient());
        assert!(CompanionError::storage("disk full").is_transient());
        assert!(!CompanionError::invalid("bad rating").is_transient());
        assert!(CompanionError::cancelled("detached").is_cancelled());
    }
}
