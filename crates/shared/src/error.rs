//! Errors surfaced to API callers.
//!
//! Every failure a caller can see maps onto one of these variants, which fix
//! the HTTP status and the machine-readable code of the response body.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Caller-visible failure.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, expired or invalid credentials.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The caller may not see the requested branches.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Malformed request parameters.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required data source call failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// The request did not finish within its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Validation(_) => 400,
            Self::Timeout(_) => 504,
            Self::ExternalService(_) | Self::Internal(_) => 500,
        }
    }

    /// Code placed in the `error` field of response bodies.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Human-readable detail, without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Validation(m)
            | Self::ExternalService(m)
            | Self::Timeout(m)
            | Self::Internal(m) => m,
        }
    }
}
