//! Volatile in-memory storage backend.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::entities::{NewUrl, StorageStats, StoredUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

#[derive(Default)]
struct Inner {
    /// Primary index: short code -> record.
    by_code: HashMap<String, StoredUrl>,
    /// Secondary index: original URL -> short code of its current
    /// record, live or soft-deleted. Needed for conflict checks and
    /// the resurrection path.
    by_url: HashMap<String, String>,
}

impl Inner {
    /// Conflict resolution shared by `save` and `save_batch`. Returns
    /// the code of a soft-deleted record for `original_url` when the
    /// caller should resurrect, `None` when a plain insert is fine.
    fn check_conflicts(
        &self,
        short_code: &str,
        original_url: &str,
    ) -> Result<Option<String>, AppError> {
        if let Some(existing_code) = self.by_url.get(original_url) {
            let existing = &self.by_code[existing_code];
            if !existing.is_deleted {
                return Err(AppError::url_conflict(existing_code.clone()));
            }
            if short_code != existing_code && self.by_code.contains_key(short_code) {
                return Err(AppError::CodeConflict);
            }
            return Ok(Some(existing_code.clone()));
        }

        if self.by_code.contains_key(short_code) {
            return Err(AppError::CodeConflict);
        }

        Ok(None)
    }

    /// Applies an insert or resurrection decided by `check_conflicts`.
    fn apply(&mut self, owner_id: &str, record: &NewUrl, resurrect_from: Option<String>) {
        if let Some(old_code) = resurrect_from {
            // The URL moves to a fresh code and owner; the old code
            // ceases to exist, matching the relational UPDATE-in-place.
            self.by_code.remove(&old_code);
        }

        self.by_code.insert(
            record.short_code.clone(),
            StoredUrl::new(&record.short_code, &record.original_url, owner_id),
        );
        self.by_url
            .insert(record.original_url.clone(), record.short_code.clone());
    }
}

/// Process-lifetime backend: a map guarded by a read/write lock.
/// Readers run concurrently, writers exclusively. Nothing survives a
/// restart.
#[derive(Default)]
pub struct InMemoryUrlRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UrlRepository for InMemoryUrlRepository {
    async fn save(
        &self,
        owner_id: &str,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");

        let resurrect = inner.check_conflicts(short_code, original_url)?;
        let record = NewUrl {
            short_code: short_code.to_string(),
            original_url: original_url.to_string(),
        };
        inner.apply(owner_id, &record, resurrect);

        Ok(())
    }

    async fn save_batch(&self, owner_id: &str, records: &[NewUrl]) -> Result<(), AppError> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");

        // Pre-check every item (including duplicates inside the batch)
        // before touching the maps: a conflict anywhere persists nothing.
        let mut batch_codes = HashSet::new();
        let mut batch_urls: HashMap<&str, &str> = HashMap::new();
        let mut plan = Vec::with_capacity(records.len());

        for record in records {
            if let Some(earlier_code) = batch_urls.get(record.original_url.as_str()) {
                return Err(AppError::url_conflict(*earlier_code));
            }
            if !batch_codes.insert(record.short_code.as_str()) {
                return Err(AppError::CodeConflict);
            }

            let resurrect = inner.check_conflicts(&record.short_code, &record.original_url)?;
            plan.push(resurrect);
            batch_urls.insert(&record.original_url, &record.short_code);
        }

        for (record, resurrect) in records.iter().zip(plan) {
            inner.apply(owner_id, record, resurrect);
        }

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<StoredUrl, AppError> {
        self.inner
            .read()
            .expect("memory store lock poisoned")
            .by_code
            .get(code)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoredUrl>, AppError> {
        let inner = self.inner.read().expect("memory store lock poisoned");

        let mut records: Vec<StoredUrl> = inner
            .by_code
            .values()
            .filter(|r| r.owner_id == owner_id && !r.is_deleted)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.short_code.cmp(&b.short_code));

        Ok(records)
    }

    async fn delete_batch(&self, owner_id: &str, codes: &[String]) -> Result<(), AppError> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");

        for code in codes {
            if let Some(record) = inner.by_code.get_mut(code)
                && record.owner_id == owner_id
            {
                record.is_deleted = true;
            }
        }

        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats, AppError> {
        let inner = self.inner.read().expect("memory store lock poisoned");

        let live: Vec<&StoredUrl> = inner.by_code.values().filter(|r| !r.is_deleted).collect();
        let users: HashSet<&str> = live.iter().map(|r| r.owner_id.as_str()).collect();

        Ok(StorageStats {
            urls: live.len() as i64,
            users: users.len() as i64,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}
