//! Domain entities.

mod stored_url;

pub use stored_url::{BatchCode, BatchItem, NewUrl, StorageStats, StoredUrl};
