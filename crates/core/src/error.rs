//! Unified error types for the analytics engine.
//!
//! The taxonomy mirrors the failure policy of the pipeline:
//! validation failures stop at the ingestion boundary, transient
//! write conflicts are retried internally, and persistence failures
//! are logged without ever reaching the end user once the raw fact
//! is durable.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the analytics engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete envelope; rejected at the ingestion
    /// boundary and never persisted.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid tenant: {0}")]
    InvalidTenant(String),

    /// Two concurrent increments raced on the same aggregate row.
    /// Retried internally with a bounded budget.
    #[error("transient write conflict: {0}")]
    TransientConflict(String),

    /// The storage layer is unavailable or rejected the write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The capture client failed to deliver an event. Logged and
    /// discarded on the client side.
    #[error("client transport error: {0}")]
    ClientTransport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown funnel: {0}")]
    UnknownFunnel(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invalid_tenant(msg: impl Into<String>) -> Self {
        Self::InvalidTenant(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientConflict(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::ClientTransport(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a bounded retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConflict(_))
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::MissingField(_) => 400,
            Self::InvalidTenant(_) => 400,
            Self::Serialization(_) => 400,
            Self::UnknownFunnel(_) => 404,
            Self::TransientConflict(_) => 503,
            Self::Persistence(_) => 500,
            Self::ClientTransport(_) => 502,
            Self::Internal(_) => 500,
        }
    }
}
