//! Unified error system for Hawk
//!
//! A single error enum shared by every crate in the workspace. Callers branch on
//! the variant (or on [`HawkError::code`]), never on the message text.

use serde::{Deserialize, Serialize};

/// Unified error type for all Hawk operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum HawkError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Entity not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Entity already exists
    #[error("Already exists: {message}")]
    AlreadyExists {
        /// Error message describing the duplicate
        message: String,
    },

    /// Caller is not authenticated
    #[error("Not authenticated: {message}")]
    Unauthenticated {
        /// Error message describing the missing authentication
        message: String,
    },

    /// Caller is authenticated but lacks the authorities the operation requires.
    ///
    /// Only the operation is named; the missing authority is never disclosed.
    #[error("Insufficient permission for operation {operation}")]
    InsufficientPermission {
        /// Identifier of the denied operation
        operation: String,
    },

    /// A write carried a stale optimistic-lock revision
    #[error("Optimistic lock conflict on {entity}: expected revision {expected}, found {actual}")]
    OptimisticLock {
        /// Entity that was being written
        entity: String,
        /// Revision the writer expected
        expected: u64,
        /// Revision currently stored
        actual: u64,
    },

    /// Storage operation failed (transient)
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Operation did not complete in time
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message describing what timed out
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl HawkError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already exists error
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Create an unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create an insufficient permission error for an operation
    pub fn insufficient_permission(operation: impl Into<String>) -> Self {
        Self::InsufficientPermission {
            operation: operation.into(),
        }
    }

    /// Create an optimistic lock conflict error
    pub fn optimistic_lock(entity: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::OptimisticLock {
            entity: entity.into(),
            expected,
            actual,
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            HawkError::Invalid { .. } => "invalid",
            HawkError::NotFound { .. } => "not_found",
            HawkError::AlreadyExists { .. } => "already_exists",
            HawkError::Unauthenticated { .. } => "unauthenticated",
            HawkError::InsufficientPermission { .. } => "insufficient_permission",
            HawkError::OptimisticLock { .. } => "optimistic_lock",
            HawkError::Storage { .. } => "storage",
            HawkError::Timeout { .. } => "timeout",
            HawkError::Internal { .. } => "internal",
        }
    }

    /// Whether this error came from the access check rather than business logic
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            HawkError::Unauthenticated { .. } | HawkError::InsufficientPermission { .. }
        )
    }
}

/// Standard Result type for Hawk operations
pub type HawkResult<T> = std::result::Result<T, HawkError>;

impl From<std::io::Error> for HawkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for HawkError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(format!("Invalid TOML: {err}"))
    }
}
