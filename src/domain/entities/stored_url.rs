//! Core entity: the mapping between a short code and an original URL.

/// A persisted short-code mapping.
///
/// `short_code` is the primary key. `original_url` is unique among live
/// (non-deleted) records: a given URL maps to at most one live code.
/// Deleted records stay in storage with `is_deleted = true` so lookups
/// can distinguish "gone" from "never existed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUrl {
    pub short_code: String,
    pub original_url: String,
    pub owner_id: String,
    pub is_deleted: bool,
}

impl StoredUrl {
    /// Creates a live (non-deleted) record.
    pub fn new(
        short_code: impl Into<String>,
        original_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            short_code: short_code.into(),
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            is_deleted: false,
        }
    }
}

/// One element of a batch save: a pre-generated code plus its URL.
#[derive(Debug, Clone)]
pub struct NewUrl {
    pub short_code: String,
    pub original_url: String,
}

/// Batch-shortening input. The correlation id is opaque to the core and
/// echoed back so callers can match results to their request items.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// Batch-shortening output, one per input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCode {
    pub correlation_id: String,
    pub short_code: String,
}

/// Aggregate counts for operational visibility. Access control is the
/// transport layer's responsibility, not the backend's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of live (non-deleted) records.
    pub urls: i64,
    /// Number of distinct owners with at least one live record.
    pub users: i64,
}
