//! Error types for etcd-warden
//!
//! Errors are structured with fields to aid debugging in production.
//! Probes never surface these to their callers: they are classified into
//! condition statuses. The controller uses [`ReconcileError`].

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for etcd-warden operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for Etcd specs
    #[error("validation error for {etcd}: {message}")]
    Validation {
        /// Name of the Etcd with invalid configuration
        etcd: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// The caller cancelled the operation while it was in flight
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted (e.g., "get lease etcd-main-full-snap")
        operation: String,
    },

    /// The operation did not complete within its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "probe", "controller")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            etcd: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error with Etcd context
    pub fn validation_for(etcd: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            etcd: etcd.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error for the given operation
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Check if this error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

/// Error returned from controller reconcile functions
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Writing the Etcd status failed
    #[error("status update failed: {0}")]
    Status(#[from] Error),

    /// The Etcd object is malformed (e.g., missing namespace)
    #[error("validation error: {0}")]
    Validation(String),
}
