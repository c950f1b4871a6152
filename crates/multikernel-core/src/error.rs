//! Error types for the multikernel substrate.

use thiserror::Error;

/// Result type alias using `KernelError`.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur during substrate operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation invoked before `initialize` or after `shutdown`.
    #[error("Component not initialized: {0}")]
    NotInitialized(String),

    /// Worker pool queue is at capacity.
    #[error("Worker queue full (capacity: {capacity})")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// Submission after the worker pool stopped.
    #[error("Worker pool stopped")]
    PoolStopped,

    /// Invalid kernel state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Filesystem error during recovery point persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Checksum mismatch or restore callback rejection.
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    /// Run-length decode encountered a malformed stream.
    #[error("Corrupt run-length stream at offset {offset}")]
    CorruptRunLength {
        /// Byte offset of the malformed marker.
        offset: usize,
    },

    /// Recovery point not present in the index or on disk.
    #[error("Recovery point not found: {0}")]
    PointNotFound(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KernelError {
    /// Create an invalid-configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        KernelError::InvalidConfig(msg.into())
    }

    /// Create a not-initialized error.
    #[must_use]
    pub fn not_initialized(component: impl Into<String>) -> Self {
        KernelError::NotInitialized(component.into())
    }

    /// Create a validation-failure error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        KernelError::ValidationFailure(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        KernelError::Internal(msg.into())
    }

    /// Returns true if the caller may retry the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KernelError::QueueFull { .. } | KernelError::ValidationFailure(_)
        )
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::Serialization(err.to_string())
    }
}
