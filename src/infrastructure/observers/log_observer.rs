//! Audit observer that writes events to the tracing pipeline.

use crate::domain::audit::{AuditEvent, AuditObserver};
use crate::error::AppError;

/// Emits each audit event as a structured `info` log line.
///
/// The simplest possible sink; anything heavier (files, message buses)
/// belongs in its own observer.
#[derive(Debug, Default)]
pub struct LogAuditObserver;

impl LogAuditObserver {
    pub fn new() -> Self {
        Self
    }
}

impl AuditObserver for LogAuditObserver {
    fn notify(&self, event: &AuditEvent) -> Result<(), AppError> {
        tracing::info!(
            timestamp = event.timestamp,
            action = ?event.action,
            owner = %event.owner_id,
            url = %event.url,
            "audit"
        );
        Ok(())
    }
}
