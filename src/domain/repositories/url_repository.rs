//! Repository trait for short-URL storage backends.

use crate::domain::entities::{NewUrl, StorageStats, StoredUrl};
use crate::error::AppError;
use async_trait::async_trait;

/// Storage contract shared by all backends.
///
/// All implementations enforce the same semantics: short-code
/// uniqueness, one live record per original URL, all-or-nothing batch
/// saves, and soft deletion. Backends must be safe for concurrent use
/// from multiple tasks.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::InMemoryUrlRepository`] - volatile map
/// - [`crate::infrastructure::persistence::FileUrlRepository`] - append-only log
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Persists a new mapping.
    ///
    /// # Resurrection
    ///
    /// When the record mapping `original_url` exists but is soft-deleted,
    /// the backend reactivates it in place under the new code and owner
    /// and returns success. This rule is uniform across backends.
    ///
    /// # Errors
    ///
    /// - [`AppError::UrlConflict`] if a live record already maps
    ///   `original_url`; carries the existing short code.
    /// - [`AppError::CodeConflict`] if `short_code` is taken by a
    ///   different original URL.
    /// - [`AppError::Storage`] on backend failures.
    async fn save(
        &self,
        owner_id: &str,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), AppError>;

    /// Persists a batch of mappings atomically.
    ///
    /// All-or-nothing: if any item would conflict, no item is persisted.
    /// Per-item resurrection applies exactly as in [`Self::save`].
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::save`]; the first conflicting item
    /// determines the error.
    async fn save_batch(&self, owner_id: &str, records: &[NewUrl]) -> Result<(), AppError>;

    /// Looks up a record by short code.
    ///
    /// Soft-deleted records are returned with `is_deleted = true`;
    /// callers decide whether deletion is an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no record exists for `code`.
    async fn find_by_code(&self, code: &str) -> Result<StoredUrl, AppError>;

    /// Lists all live records belonging to `owner_id`.
    ///
    /// Soft-deleted records are excluded. An owner with no records gets
    /// an empty list, not an error.
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoredUrl>, AppError>;

    /// Soft-deletes the records matching both `owner_id` and one of
    /// `codes`.
    ///
    /// Codes that do not match (absent, owned by someone else, or
    /// already deleted) are silently ignored; partial matches are
    /// expected. Idempotent.
    async fn delete_batch(&self, owner_id: &str, codes: &[String]) -> Result<(), AppError>;

    /// Aggregate live-record and owner counts.
    async fn stats(&self) -> Result<StorageStats, AppError>;

    /// Liveness check.
    async fn ping(&self) -> Result<(), AppError>;

    /// Releases backend resources. Safe to call more than once.
    async fn close(&self) -> Result<(), AppError>;
}
