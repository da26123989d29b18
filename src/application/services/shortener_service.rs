//! Shortening coordinator: code generation, storage orchestration,
//! asynchronous deletion, audit fan-out.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::audit::{AuditAction, AuditEvent, AuditNotifier, AuditObserver};
use crate::domain::deletion::{DeletionQueue, DeletionRequest};
use crate::domain::entities::{BatchCode, BatchItem, StorageStats, StoredUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::utils::code_generator::{CODE_LENGTH, generate_code};
use crate::utils::url_normalizer::normalize_url;

/// Collision-retry budget for a single shorten call.
const MAX_ATTEMPTS: usize = 10;

/// Stateless orchestration facade over a storage backend.
///
/// Owns the deletion queue and the audit notifier; everything else is
/// a pass-through with conflict handling. Safe to share behind an
/// `Arc` across concurrent callers.
pub struct ShortenerService<R: UrlRepository + ?Sized> {
    repository: Arc<R>,
    deletions: DeletionQueue,
    audit: AuditNotifier,
}

impl<R: UrlRepository + ?Sized + 'static> ShortenerService<R> {
    /// Creates the service and spawns its deletion workers.
    pub fn new(
        repository: Arc<R>,
        queue_capacity: usize,
        delete_workers: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        let deletions = DeletionQueue::new(
            Arc::clone(&repository),
            queue_capacity,
            delete_workers,
            shutdown_timeout,
        );

        Self {
            repository,
            deletions,
            audit: AuditNotifier::new(),
        }
    }

    /// Registers an audit observer. Registration order is notification
    /// order.
    pub fn register_observer(&self, observer: Arc<dyn AuditObserver>) {
        self.audit.register(observer);
    }

    /// Shortens a URL for `owner_id`, returning the new 8-character code.
    ///
    /// Generates a candidate code and saves; a code collision retries
    /// with a fresh code, up to [`MAX_ATTEMPTS`] times. Other storage
    /// failures also consume an attempt - exhaustion reports
    /// [`AppError::GenerationExhausted`] either way, so callers cannot
    /// tell collision bad luck from a broken backend. Both are retried
    /// the same way operationally.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidUrl`] when the URL fails normalization.
    /// - [`AppError::UrlConflict`] when the URL is already shortened;
    ///   carries the existing code, so callers can treat this as
    ///   "already exists" rather than a failure.
    /// - [`AppError::GenerationExhausted`] when the retry budget is spent.
    pub async fn shorten(&self, owner_id: &str, original_url: &str) -> Result<String, AppError> {
        let normalized = normalize_url(original_url)?;

        for attempt in 1..=MAX_ATTEMPTS {
            let code = generate_code(CODE_LENGTH);

            match self.repository.save(owner_id, &code, &normalized).await {
                Ok(()) => {
                    self.audit.notify_all(&AuditEvent::now(
                        AuditAction::Shorten,
                        owner_id,
                        &normalized,
                    ));
                    return Ok(code);
                }
                Err(AppError::CodeConflict) => {
                    tracing::debug!(attempt, "short code collision, retrying");
                }
                Err(conflict @ AppError::UrlConflict { .. }) => return Err(conflict),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "save failed while shortening");
                }
            }
        }

        Err(AppError::GenerationExhausted)
    }

    /// Shortens a batch of URLs atomically.
    ///
    /// One code is generated per item independently, then a single
    /// batch save runs. If any item conflicts the whole call fails and
    /// none of the returned codes would have been valid - callers must
    /// discard everything, which is the cost of atomicity.
    pub async fn shorten_batch(
        &self,
        owner_id: &str,
        items: &[BatchItem],
    ) -> Result<Vec<BatchCode>, AppError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(items.len());
        let mut codes = Vec::with_capacity(items.len());

        for item in items {
            let normalized = normalize_url(&item.original_url)?;
            let code = generate_code(CODE_LENGTH);

            records.push(crate::domain::entities::NewUrl {
                short_code: code.clone(),
                original_url: normalized,
            });
            codes.push(BatchCode {
                correlation_id: item.correlation_id.clone(),
                short_code: code,
            });
        }

        self.repository.save_batch(owner_id, &records).await?;

        for record in &records {
            self.audit.notify_all(&AuditEvent::now(
                AuditAction::Shorten,
                owner_id,
                &record.original_url,
            ));
        }

        Ok(codes)
    }

    /// Resolves a short code to its stored record.
    ///
    /// Soft-deleted records are returned, not hidden: the transport
    /// layer needs the distinction to answer "gone" instead of "not
    /// found".
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when no record exists.
    pub async fn resolve(&self, code: &str) -> Result<StoredUrl, AppError> {
        let record = self.repository.find_by_code(code).await?;

        self.audit.notify_all(&AuditEvent::now(
            AuditAction::Follow,
            &record.owner_id,
            &record.original_url,
        ));

        Ok(record)
    }

    /// Lists the live records owned by `owner_id`.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<StoredUrl>, AppError> {
        self.repository.find_by_owner(owner_id).await
    }

    /// Enqueues a batch deletion and returns immediately.
    ///
    /// The backend call happens later on a worker; its eventual failure
    /// is logged, never reported here.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QueueFull`] when the deletion queue is at
    /// capacity - the backpressure signal for callers to shed load.
    pub fn delete_urls(&self, owner_id: &str, short_codes: Vec<String>) -> Result<(), AppError> {
        self.deletions.enqueue(DeletionRequest {
            owner_id: owner_id.to_string(),
            short_codes,
        })
    }

    /// Aggregate storage counts.
    pub async fn stats(&self) -> Result<StorageStats, AppError> {
        self.repository.stats().await
    }

    /// Storage liveness check.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.repository.ping().await
    }

    /// Stops accepting deletions, drains the queue, and closes the
    /// backend. Safe to call more than once.
    pub async fn close(&self) -> Result<(), AppError> {
        self.deletions.close().await;
        self.repository.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::MockAuditObserver;
    use crate::domain::repositories::MockUrlRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service(repo: MockUrlRepository) -> ShortenerService<MockUrlRepository> {
        ShortenerService::new(Arc::new(repo), 64, 1, Duration::from_secs(5))
    }

    /// Service with no deletion workers, for deterministic queue tests.
    fn service_without_workers(
        repo: MockUrlRepository,
        capacity: usize,
    ) -> ShortenerService<MockUrlRepository> {
        ShortenerService::new(Arc::new(repo), capacity, 0, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_shorten_returns_eight_char_code() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save()
            .withf(|owner, code, url| {
                owner == "u1" && code.len() == 8 && url == "https://example.com/a"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service(repo);
        let code = service.shorten("u1", "https://example.com/a").await.unwrap();

        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_shorten_normalizes_before_saving() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save()
            .withf(|_, _, url| url == "https://example.com/a")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = service(repo);
        service
            .shorten("u1", "HTTPS://EXAMPLE.COM:443/a#frag")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shorten_rejects_invalid_url_without_touching_storage() {
        let repo = MockUrlRepository::new();

        let service = service(repo);
        let err = service.shorten("u1", "not-a-url").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_shorten_retries_on_code_collision() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut repo = MockUrlRepository::new();
        repo.expect_save().times(3).returning(move |_, _, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::CodeConflict)
            } else {
                Ok(())
            }
        });

        let service = service(repo);
        let code = service.shorten("u1", "https://example.com/a").await.unwrap();

        assert_eq!(code.len(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shorten_short_circuits_on_url_conflict() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save()
            .times(1)
            .returning(|_, _, _| Err(AppError::url_conflict("existing1")));

        let service = service(repo);
        let err = service
            .shorten("u2", "https://example.com/a")
            .await
            .unwrap_err();

        match err {
            AppError::UrlConflict { short_code } => assert_eq!(short_code, "existing1"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shorten_exhausts_retry_budget() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save()
            .times(MAX_ATTEMPTS)
            .returning(|_, _, _| Err(AppError::CodeConflict));

        let service = service(repo);
        let err = service
            .shorten("u1", "https://example.com/a")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationExhausted));
    }

    #[tokio::test]
    async fn test_storage_failures_also_surface_as_exhaustion() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save()
            .times(MAX_ATTEMPTS)
            .returning(|_, _, _| Err(AppError::storage("backend down")));

        let service = service(repo);
        let err = service
            .shorten("u1", "https://example.com/a")
            .await
            .unwrap_err();

        // The information boundary: callers see the same error as for
        // collision exhaustion.
        assert!(matches!(err, AppError::GenerationExhausted));
    }

    #[tokio::test]
    async fn test_shorten_batch_returns_matching_correlation_ids() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save_batch()
            .withf(|owner, records| {
                owner == "u1"
                    && records.len() == 2
                    && records.iter().all(|r| r.short_code.len() == 8)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(repo);
        let items = vec![
            BatchItem {
                correlation_id: "first".to_string(),
                original_url: "https://example.com/1".to_string(),
            },
            BatchItem {
                correlation_id: "second".to_string(),
                original_url: "https://example.com/2".to_string(),
            },
        ];

        let codes = service.shorten_batch("u1", &items).await.unwrap();

        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].correlation_id, "first");
        assert_eq!(codes[1].correlation_id, "second");
        assert_ne!(codes[0].short_code, codes[1].short_code);
    }

    #[tokio::test]
    async fn test_shorten_batch_fails_whole_call_on_conflict() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save_batch()
            .times(1)
            .returning(|_, _| Err(AppError::url_conflict("taken001")));

        let service = service(repo);
        let items = vec![BatchItem {
            correlation_id: "only".to_string(),
            original_url: "https://example.com/1".to_string(),
        }];

        let err = service.shorten_batch("u1", &items).await.unwrap_err();
        assert!(matches!(err, AppError::UrlConflict { .. }));
    }

    #[tokio::test]
    async fn test_shorten_batch_empty_input_skips_storage() {
        let repo = MockUrlRepository::new();
        let service = service(repo);

        let codes = service.shorten_batch("u1", &[]).await.unwrap();
        assert!(codes.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_returns_deleted_records() {
        let mut repo = MockUrlRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| {
            let mut record = StoredUrl::new("gone0001", "https://example.com/g", "u1");
            record.is_deleted = true;
            Ok(record)
        });

        let service = service(repo);
        let record = service.resolve("gone0001").await.unwrap();

        // Deleted records come back marked, not hidden; the transport
        // layer turns this into 410 rather than 404.
        assert!(record.is_deleted);
    }

    #[tokio::test]
    async fn test_delete_urls_enqueues_and_workers_drain() {
        let mut repo = MockUrlRepository::new();
        repo.expect_delete_batch()
            .withf(|owner, codes| owner == "u1" && codes == ["abcd1234".to_string()])
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_close().returning(|| Ok(()));

        let service = service(repo);
        service
            .delete_urls("u1", vec!["abcd1234".to_string()])
            .unwrap();

        // close() waits for the worker, which must have processed the
        // request exactly once.
        service.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_urls_reports_queue_full() {
        let repo = MockUrlRepository::new();
        let service = service_without_workers(repo, 1);

        service.delete_urls("u1", vec!["a".to_string()]).unwrap();
        let err = service
            .delete_urls("u1", vec!["b".to_string()])
            .unwrap_err();

        assert!(matches!(err, AppError::QueueFull));
    }

    #[tokio::test]
    async fn test_audit_observers_hear_shorten_and_follow() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save().returning(|_, _, _| Ok(()));
        repo.expect_find_by_code()
            .returning(|_| Ok(StoredUrl::new("code0001", "https://example.com/a", "u1")));

        let mut observer = MockAuditObserver::new();
        observer
            .expect_notify()
            .withf(|e| e.action == AuditAction::Shorten && e.owner_id == "u1")
            .times(1)
            .returning(|_| Ok(()));
        observer
            .expect_notify()
            .withf(|e| e.action == AuditAction::Follow)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repo);
        service.register_observer(Arc::new(observer));

        service.shorten("u1", "https://example.com/a").await.unwrap();
        service.resolve("code0001").await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_observer_never_fails_the_operation() {
        let mut repo = MockUrlRepository::new();
        repo.expect_save().returning(|_, _, _| Ok(()));

        let mut observer = MockAuditObserver::new();
        observer
            .expect_notify()
            .times(1)
            .returning(|_| Err(AppError::storage("sink down")));

        let service = service(repo);
        service.register_observer(Arc::new(observer));

        let result = service.shorten("u1", "https://example.com/a").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut repo = MockUrlRepository::new();
        repo.expect_close().times(2).returning(|| Ok(()));

        let service = service(repo);
        service.close().await.unwrap();
        service.close().await.unwrap();
    }
}
