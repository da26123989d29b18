#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shortly::application::services::ShortenerService;
use shortly::domain::audit::{AuditEvent, AuditObserver};
use shortly::domain::repositories::UrlRepository;
use shortly::error::AppError;
use shortly::infrastructure::persistence::{FileUrlRepository, InMemoryUrlRepository};

pub fn memory_repo() -> Arc<dyn UrlRepository> {
    Arc::new(InMemoryUrlRepository::new())
}

pub fn file_repo(path: impl AsRef<Path>) -> Arc<dyn UrlRepository> {
    Arc::new(FileUrlRepository::open(path).unwrap())
}

pub fn create_test_service(repository: Arc<dyn UrlRepository>) -> ShortenerService<dyn UrlRepository> {
    ShortenerService::new(repository, 64, 2, Duration::from_secs(5))
}

/// Service with no deletion workers so enqueued requests stay queued.
pub fn create_stalled_service(
    repository: Arc<dyn UrlRepository>,
    capacity: usize,
) -> ShortenerService<dyn UrlRepository> {
    ShortenerService::new(repository, capacity, 0, Duration::from_secs(1))
}

/// Observer that counts notifications, optionally failing each one.
pub struct CountingObserver {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuditObserver for CountingObserver {
    fn notify(&self, _event: &AuditEvent) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AppError::storage("observer sink unavailable"))
        } else {
            Ok(())
        }
    }
}
