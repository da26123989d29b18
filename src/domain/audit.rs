//! Audit events and the observer fan-out.
//!
//! Every successful coordinator operation produces an [`AuditEvent`]
//! that is distributed to all registered observers. Audit is strictly
//! advisory: observer failures are logged and never turn a successful
//! domain operation into an error.

use std::sync::{Arc, RwLock};

use crate::error::AppError;

/// What the audited operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A new mapping was created.
    Shorten,
    /// An existing mapping was resolved.
    Follow,
}

/// An immutable record of one coordinator operation.
///
/// Created per operation, consumed once per registered observer, never
/// persisted by the core itself (persistence, if any, is an observer's
/// concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub action: AuditAction,
    pub owner_id: String,
    pub url: String,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    pub fn now(action: AuditAction, owner_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            action,
            owner_id: owner_id.into(),
            url: url.into(),
        }
    }
}

/// A sink for audit events.
///
/// Observers run synchronously inside `notify_all` and should return
/// quickly; slow or remote sinks belong behind their own buffering.
#[cfg_attr(test, mockall::automock)]
pub trait AuditObserver: Send + Sync {
    fn notify(&self, event: &AuditEvent) -> Result<(), AppError>;
}

/// Ordered fan-out of audit events to independently failing observers.
///
/// Notification order is registration order. A failing observer's error
/// is logged and does not stop delivery to subsequent observers.
#[derive(Default)]
pub struct AuditNotifier {
    observers: RwLock<Vec<Arc<dyn AuditObserver>>>,
}

impl AuditNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer. Later registrations are notified later.
    pub fn register(&self, observer: Arc<dyn AuditObserver>) {
        self.observers
            .write()
            .expect("audit observer lock poisoned")
            .push(observer);
    }

    /// Delivers `event` to every registered observer in order.
    ///
    /// Never fails: observer errors are logged and swallowed here, at
    /// the fan-out boundary.
    pub fn notify_all(&self, event: &AuditEvent) {
        let observers = self
            .observers
            .read()
            .expect("audit observer lock poisoned");

        for observer in observers.iter() {
            if let Err(e) = observer.notify(event) {
                tracing::warn!(error = %e, action = ?event.action, "audit observer failed");
            }
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .expect("audit observer lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
