//! Audit observer implementations.

mod log_observer;

pub use log_observer::LogAuditObserver;
