//! Append-only file storage backend.
//!
//! The canonical state lives in an in-memory index; the file is a
//! newline-delimited JSON log replayed fully at startup. Every mutation
//! appends one record per affected row and flushes before the in-memory
//! index is updated, so an I/O failure leaves memory untouched.
//! Replay order is last-writer-wins per short code.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{NewUrl, StorageStats, StoredUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

/// On-disk line format, one JSON object per line.
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    uuid: String,
    short_url: String,
    original_url: String,
    user_id: String,
    #[serde(default)]
    is_deleted: bool,
}

impl FileRecord {
    fn from_stored(uuid: u64, record: &StoredUrl) -> Self {
        Self {
            uuid: uuid.to_string(),
            short_url: record.short_code.clone(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.clone(),
            is_deleted: record.is_deleted,
        }
    }

    fn into_stored(self) -> StoredUrl {
        StoredUrl {
            short_code: self.short_url,
            original_url: self.original_url,
            owner_id: self.user_id,
            is_deleted: self.is_deleted,
        }
    }
}

#[derive(Debug)]
struct Inner {
    by_code: HashMap<String, StoredUrl>,
    by_url: HashMap<String, String>,
    log: File,
    next_uuid: u64,
}

impl Inner {
    /// Serializes `records`, appends them as one write, and flushes.
    /// Only after the append succeeds may the caller touch the index.
    fn append(&mut self, records: &[StoredUrl]) -> Result<(), AppError> {
        let mut buffer = String::new();
        for record in records {
            let line = serde_json::to_string(&FileRecord::from_stored(self.next_uuid, record))?;
            self.next_uuid += 1;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        self.log.write_all(buffer.as_bytes())?;
        self.log.flush()?;
        Ok(())
    }

    /// Same conflict rules as the other backends; returns the code of a
    /// soft-deleted record to resurrect, if any.
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

    fn index(&mut self, record: StoredUrl, resurrect_from: Option<String>) {
        if let Some(old_code) = resurrect_from {
            self.by_code.remove(&old_code);
        }
        self.by_url
            .insert(record.original_url.clone(), record.short_code.clone());
        self.by_code.insert(record.short_code.clone(), record);
    }
}

/// Durable backend backed by an append-only JSON-lines log.
///
/// A single mutex guards both the index and the log handle; no lock is
/// held across await points.
#[derive(Debug)]
pub struct FileUrlRepository {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileUrlRepository {
    /// Opens (or creates) the log at `path` and replays it into memory.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the file cannot be opened or a
    /// line cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        let mut inner = Inner {
            by_code: HashMap::new(),
            by_url: HashMap::new(),
            log,
            next_uuid: 0,
        };
        Self::replay(&path, &mut inner)?;

        tracing::info!(
            path = %path.display(),
            records = inner.by_code.len(),
            "file storage loaded"
        );

        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    fn replay(path: &Path, inner: &mut Inner) -> Result<(), AppError> {
        let reader = BufReader::new(File::open(path)?);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: FileRecord = serde_json::from_str(&line).map_err(|e| {
                AppError::storage(format!("corrupt record in {}: {e}", path.display()))
            })?;

            if let Ok(uuid) = record.uuid.parse::<u64>() {
                inner.next_uuid = inner.next_uuid.max(uuid + 1);
            }

            let stored = record.into_stored();

            // A later record for the same URL under a different code
            // supersedes the earlier one (resurrection moved the URL).
            if let Some(prev_code) = inner.by_url.get(&stored.original_url)
                && *prev_code != stored.short_code
            {
                let prev_code = prev_code.clone();
                inner.by_code.remove(&prev_code);
            }

            inner
                .by_url
                .insert(stored.original_url.clone(), stored.short_code.clone());
            inner.by_code.insert(stored.short_code.clone(), stored);
        }

        Ok(())
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UrlRepository for FileUrlRepository {
    async fn save(
        &self,
        owner_id: &str,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("file store lock poisoned");

        let resurrect = inner.check_conflicts(short_code, original_url)?;
        let record = StoredUrl::new(short_code, original_url, owner_id);

        inner.append(std::slice::from_ref(&record))?;
        inner.index(record, resurrect);

        Ok(())
    }

    async fn save_batch(&self, owner_id: &str, records: &[NewUrl]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("file store lock poisoned");

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

            plan.push(inner.check_conflicts(&record.short_code, &record.original_url)?);
            batch_urls.insert(&record.original_url, &record.short_code);
        }

        let stored: Vec<StoredUrl> = records
            .iter()
            .map(|r| StoredUrl::new(&r.short_code, &r.original_url, owner_id))
            .collect();

        // One append for the whole batch: either every line lands in
        // the log or none does.
        inner.append(&stored)?;
        for (record, resurrect) in stored.into_iter().zip(plan) {
            inner.index(record, resurrect);
        }

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<StoredUrl, AppError> {
        self.inner
            .lock()
            .expect("file store lock poisoned")
            .by_code
            .get(code)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoredUrl>, AppError> {
        let inner = self.inner.lock().expect("file store lock poisoned");

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
        let mut inner = self.inner.lock().expect("file store lock poisoned");

        let mut tombstones = Vec::new();
        for code in codes {
            if let Some(record) = inner.by_code.get(code)
                && record.owner_id == owner_id
                && !record.is_deleted
            {
                let mut deleted = record.clone();
                deleted.is_deleted = true;
                tombstones.push(deleted);
            }
        }

        if tombstones.is_empty() {
            return Ok(());
        }

        inner.append(&tombstones)?;
        for record in tombstones {
            inner.by_code.insert(record.short_code.clone(), record);
        }

        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats, AppError> {
        let inner = self.inner.lock().expect("file store lock poisoned");

        let live: Vec<&StoredUrl> = inner.by_code.values().filter(|r| !r.is_deleted).collect();
        let users: HashSet<&str> = live.iter().map(|r| r.owner_id.as_str()).collect();

        Ok(StorageStats {
            urls: live.len() as i64,
            users: users.len() as i64,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        // The handle stays open for the repository's lifetime; verify
        // the file is still there.
        if self.path.exists() {
            Ok(())
        } else {
            Err(AppError::storage(format!(
                "storage file missing: {}",
                self.path.display()
            )))
        }
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("file store lock poisoned");
        inner.log.flush()?;
        Ok(())
    }
}
