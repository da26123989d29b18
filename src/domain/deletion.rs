//! Asynchronous, backpressured batch deletion.
//!
//! Deletions are hands-off: the coordinator enqueues a request and
//! returns immediately; a small fixed pool of workers drains the queue
//! and calls the backend. Deletions are best-effort by design - a
//! storage failure inside a worker is logged and the request dropped,
//! with no retry and no dead-letter queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

/// A batch of short codes to soft-delete on behalf of one owner.
///
/// Owned by the queue from enqueue to completion and discarded after
/// the backend call returns.
#[derive(Debug, Clone)]
pub struct DeletionRequest {
    pub owner_id: String,
    pub short_codes: Vec<String>,
}

/// Bounded work queue plus worker pool for batch deletions.
///
/// Enqueue never blocks: a full queue fails fast with
/// [`AppError::QueueFull`], which is the backpressure signal transport
/// handlers rely on to return 429. Workers run until [`Self::close`]
/// drops the sender; remaining requests are drained before workers
/// exit, bounded by the shutdown timeout.
pub struct DeletionQueue {
    tx: Mutex<Option<mpsc::Sender<DeletionRequest>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl DeletionQueue {
    /// Spawns `workers` worker tasks draining a channel of `capacity`.
    pub fn new<R>(
        repository: Arc<R>,
        capacity: usize,
        workers: usize,
        shutdown_timeout: Duration,
    ) -> Self
    where
        R: UrlRepository + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel::<DeletionRequest>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let repository = Arc::clone(&repository);
                tokio::spawn(run_deletion_worker(id, rx, repository))
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(handles),
            shutdown_timeout,
        }
    }

    /// Enqueues a request without blocking.
    ///
    /// # Errors
    ///
    /// - [`AppError::QueueFull`] when the queue is at capacity.
    /// - [`AppError::Storage`] when the queue has been closed.
    pub fn enqueue(&self, request: DeletionRequest) -> Result<(), AppError> {
        let guard = self.tx.lock().expect("deletion queue lock poisoned");

        match guard.as_ref() {
            Some(tx) => tx.try_send(request).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => AppError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => {
                    AppError::storage("deletion queue closed")
                }
            }),
            None => Err(AppError::storage("deletion queue closed")),
        }
    }

    /// Closes the queue for new entries and waits for workers to drain.
    ///
    /// Each worker gets at most the shutdown timeout to finish its
    /// backlog; a worker still running after that is abandoned with a
    /// warning. Safe to call more than once.
    pub async fn close(&self) {
        let tx = self
            .tx
            .lock()
            .expect("deletion queue lock poisoned")
            .take();
        drop(tx);

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();

        for mut handle in handles {
            match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "deletion worker panicked"),
                Err(_) => {
                    handle.abort();
                    tracing::warn!(
                        timeout_secs = self.shutdown_timeout.as_secs(),
                        "deletion worker did not drain in time, abandoning"
                    );
                }
            }
        }
    }
}

/// Worker loop: pull one request at a time, invoke the backend, log and
/// drop on failure. Exits when the sender is dropped and the queue is
/// empty.
async fn run_deletion_worker<R>(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<DeletionRequest>>>,
    repository: Arc<R>,
) where
    R: UrlRepository + ?Sized,
{
    loop {
        let request = { rx.lock().await.recv().await };

        let Some(request) = request else {
            break;
        };

        match repository
            .delete_batch(&request.owner_id, &request.short_codes)
            .await
        {
            Ok(()) => tracing::debug!(
                worker = id,
                owner = %request.owner_id,
                codes = request.short_codes.len(),
                "processed deletion request"
            ),
            Err(e) => tracing::error!(
                worker = id,
                owner = %request.owner_id,
                error = %e,
                "deletion request dropped"
            ),
        }
    }

    tracing::debug!(worker = id, "deletion worker stopped");
}
