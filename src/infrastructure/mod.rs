//! Infrastructure layer: storage backends and audit sinks.

pub mod observers;
pub mod persistence;
