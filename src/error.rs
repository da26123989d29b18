//! Unified error type for the shortening core.
//!
//! Transport adapters map these variants onto their own status codes
//! (`UrlConflict` -> 409, `NotFound` -> 404/410, `QueueFull` -> 429,
//! everything else -> 500). The core itself never inspects transport
//! concerns.

use thiserror::Error;

/// Errors produced by the coordinator and the storage backends.
#[derive(Debug, Error)]
pub enum AppError {
    /// A live record already maps this original URL. Carries the short
    /// code of the existing mapping so callers can answer "already
    /// shortened" instead of failing outright.
    #[error("original URL is already shortened as '{short_code}'")]
    UrlConflict { short_code: String },

    /// The generated short code is taken by a different original URL.
    /// Retryable by generating a fresh code; never surfaced to callers
    /// of the coordinator.
    #[error("short code is already in use")]
    CodeConflict,

    /// No record exists for the requested short code.
    #[error("short link not found")]
    NotFound,

    /// The collision-retry budget was spent without a successful save.
    /// Deliberately hides whether the cause was collision bad luck or a
    /// failing backend; both are operationally retryable the same way.
    #[error("could not generate a unique short code")]
    GenerationExhausted,

    /// The deletion queue is at capacity. Callers should shed load or
    /// retry later.
    #[error("too many pending deletion requests")]
    QueueFull,

    /// The submitted URL failed validation or normalization.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Opaque storage-layer failure (I/O, serialization, database).
    /// Logged at the point of origin, surfaced as an internal error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn url_conflict(short_code: impl Into<String>) -> Self {
        Self::UrlConflict {
            short_code: short_code.into(),
        }
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Returns true for conflicts the coordinator resolves by retrying
    /// with a fresh code.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::CodeConflict)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_conflict_carries_code() {
        let err = AppError::url_conflict("abc123");
        match err {
            AppError::UrlConflict { short_code } => assert_eq!(short_code, "abc123"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_only_code_conflict_is_retryable() {
        assert!(AppError::CodeConflict.is_retryable_conflict());
        assert!(!AppError::url_conflict("x").is_retryable_conflict());
        assert!(!AppError::NotFound.is_retryable_conflict());
        assert!(!AppError::QueueFull.is_retryable_conflict());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound));
    }
}
