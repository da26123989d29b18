//! Storage backend implementations and selection.

mod file;
mod memory;
mod postgres;

pub use file::FileUrlRepository;
pub use memory::InMemoryUrlRepository;
pub use postgres::PgUrlRepository;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

/// Builds the storage backend selected by configuration.
///
/// Runs once during process startup, not on the hot path.
pub async fn build_repository(config: &Config) -> Result<Arc<dyn UrlRepository>, AppError> {
    match &config.storage {
        StorageBackend::Memory => Ok(Arc::new(InMemoryUrlRepository::new())),
        StorageBackend::File { path } => Ok(Arc::new(FileUrlRepository::open(path)?)),
        StorageBackend::Postgres { dsn } => {
            let repo = PgUrlRepository::connect(
                dsn,
                config.db_max_connections,
                Duration::from_secs(config.db_connect_timeout),
            )
            .await?;
            Ok(Arc::new(repo))
        }
    }
}
