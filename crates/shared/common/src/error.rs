//! Unified error handling for the services and the HTTP gateway.
//!
//! Every failure maps onto a small taxonomy ([`ErrorKind`]) and converts to an
//! Axum response with a stable error code. Internal details are logged here
//! and never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("Authentication required")]
    Unauthorized,

    /// Carries the detailed reason for the server log only
    #[error("Permission denied")]
    PermissionDenied(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    // Validation
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<String>,
    },

    #[error("Invalid input: {0}")]
    BadRequest(String),

    // Rate limiting
    #[error("Too many requests")]
    TooManyRequests,

    // Boundaries
    #[error("{0} is unavailable")]
    UpstreamUnavailable(String),

    /// An optimistic write was not confirmed in time
    #[error("Write not confirmed")]
    WriteUncertain(Uuid),

    // External service errors
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[cfg(feature = "jwt")]
    #[error("Authentication error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[cfg(feature = "cache")]
    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error taxonomy shared by every boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PermissionDenied,
    Conflict,
    UpstreamUnavailable,
    WriteUncertain,
    NotFound,
    Unauthorized,
    RateLimited,
    Internal,
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized => ErrorKind::Unauthorized,
            #[cfg(feature = "jwt")]
            AppError::Jwt(_) => ErrorKind::Unauthorized,
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AppError::NotFound => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Validation { .. } | AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::TooManyRequests => ErrorKind::RateLimited,
            AppError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            #[cfg(feature = "database")]
            AppError::Database(_) => ErrorKind::UpstreamUnavailable,
            #[cfg(feature = "cache")]
            AppError::Cache(_) => ErrorKind::UpstreamUnavailable,
            AppError::WriteUncertain(_) => ErrorKind::WriteUncertain,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::TooManyRequests => "TOO_MANY_REQUESTS",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::WriteUncertain(_) => "WRITE_UNCERTAIN",
            #[cfg(feature = "database")]
            AppError::Database(_) => "UPSTREAM_UNAVAILABLE",
            #[cfg(feature = "jwt")]
            AppError::Jwt(_) => "AUTH_ERROR",
            #[cfg(feature = "cache")]
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::WriteUncertain => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            // Show full message for client errors
            AppError::Validation { message, .. } => message.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => format!("{}. Refresh and try again", msg),

            AppError::PermissionDenied(reason) => {
                tracing::warn!("Permission denied: {}", reason);
                "You are not allowed to perform this action".to_string()
            }
            AppError::WriteUncertain(correlation_id) => {
                tracing::warn!(%correlation_id, "Write not confirmed before timeout");
                "The change could not be confirmed. Refresh to check whether it was saved".to_string()
            }

            // Hide details for internal/security errors
            #[cfg(feature = "database")]
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "The data store is unavailable, please retry".to_string()
            }
            #[cfg(feature = "jwt")]
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            #[cfg(feature = "cache")]
            AppError::Cache(e) => {
                tracing::error!("Cache error: {:?}", e);
                "A cache error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::UpstreamUnavailable(service) => {
                tracing::error!("Upstream unavailable: {}", service);
                format!("{} is unavailable, please retry", service)
            }

            // Use default message for others
            _ => self.to_string(),
        }
    }

    fn fields(&self) -> Option<Vec<String>> {
        match self {
            AppError::Validation { fields, .. } if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
                fields: self.fields(),
            },
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message, fields } => AppError::Validation { message, fields },
            DomainError::PermissionDenied(reason) => AppError::PermissionDenied(reason),
            DomainError::NotFound(_) => AppError::NotFound,
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::UnknownRole(role) => AppError::Validation {
                message: format!("Unknown role '{}'", role),
                fields: vec!["role".to_string()],
            },
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation {
            message: msg.into(),
            fields: Vec::new(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        AppError::Validation {
            message: msg.into(),
            fields: vec![field.into()],
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        AppError::PermissionDenied(reason.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn upstream(service: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable(service.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status() {
        assert_eq!(AppError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::denied("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(AppError::upstream("geo").status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::WriteUncertain(Uuid::nil()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn permission_reason_is_not_shown_to_the_client() {
        let err = AppError::denied("operator@x.fr (operator) lacks can_export_data");
        assert!(!err.user_message().contains("operator@x.fr"));
    }

    #[test]
    fn domain_validation_keeps_fields() {
        let err: AppError = DomainError::missing_fields(vec!["city".to_string()]).into();
        assert_eq!(err.fields(), Some(vec!["city".to_string()]));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        let err: AppError = DomainError::UnknownRole("root".to_string()).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
