//! Error types for the visitors operator

use std::time::Duration;

use thiserror::Error;

/// Main error type for visitors operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for VisitorsApp specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error occurred (e.g. "owner-reference", "drift")
        context: String,
        /// Description of what failed
        message: String,
    },

    /// A reconciliation pass ran past its deadline
    #[error("reconciliation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors need a spec or code change.
    /// Kubernetes 4xx responses are permanent except for write conflicts and
    /// throttling, which clear up on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => {
                !(400..500).contains(&ae.code) || ae.code == 409 || ae.code == 429
            }
            Error::Kube(_) => true,
            Error::Validation(_) => false,
            Error::Serialization(_) => false,
            Error::Internal { .. } => true,
            Error::Timeout(_) => true,
        }
    }
}
