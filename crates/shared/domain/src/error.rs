//! Domain-level errors.
//!
//! These errors represent business rule violations and domain logic failures.
//! They are independent of infrastructure concerns (HTTP, database).

use thiserror::Error;

/// Domain-specific errors for business rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// One or more fields are missing or malformed
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<String>,
    },

    /// The caller's capabilities do not allow the action.
    /// The reason is meant for server logs, never for the client.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// State changed underneath the caller
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A role string outside the known set
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Internal domain error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Create a validation error for a single field
    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        DomainError::Validation {
            message: msg.into(),
            fields: vec![field.into()],
        }
    }

    /// Create a validation error listing every offending field
    pub fn missing_fields(fields: Vec<String>) -> Self {
        DomainError::Validation {
            message: format!("Missing or invalid fields: {}", fields.join(", ")),
            fields,
        }
    }

    /// Create a permission error with a server-side reason
    pub fn denied(reason: impl Into<String>) -> Self {
        DomainError::PermissionDenied(reason.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>) -> Self {
        DomainError::NotFound(entity.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        DomainError::Internal(msg.into())
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
