//! PostgreSQL storage backend.
//!
//! Uniqueness and batch atomicity are delegated to the database:
//! `short_code` is the primary key, `original_url` carries a unique
//! index covering deleted rows too, which is what lets the resurrection
//! path key off a constraint violation.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use crate::domain::entities::{NewUrl, StorageStats, StoredUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS short_urls (
    short_code   TEXT PRIMARY KEY,
    original_url TEXT NOT NULL,
    owner_id     TEXT NOT NULL,
    is_deleted   BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE UNIQUE INDEX IF NOT EXISTS short_urls_original_url_key
    ON short_urls (original_url);
"#;

/// Maps unique-constraint violations to [`AppError::CodeConflict`].
///
/// A violation on the primary key means the generated code is taken.
/// A violation on the URL index can only mean a concurrent writer won
/// the race after our `FOR UPDATE` check missed the row; retrying with
/// a fresh code re-runs the check and reports the live mapping
/// properly, so both cases are the retryable conflict.
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error()
        && db_err.is_unique_violation()
    {
        return AppError::CodeConflict;
    }
    e.into()
}

fn row_to_stored(row: &PgRow) -> Result<StoredUrl, sqlx::Error> {
    Ok(StoredUrl {
        short_code: row.try_get("short_code")?,
        original_url: row.try_get("original_url")?,
        owner_id: row.try_get("owner_id")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

/// Relational backend over a sqlx connection pool.
///
/// No in-process locking: concurrency control is the database's job.
pub struct PgUrlRepository {
    pool: PgPool,
}

impl PgUrlRepository {
    /// Connects to `dsn` and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] when the database is unreachable
    /// or schema creation fails.
    pub async fn connect(
        dsn: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(dsn)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool; used by tests that manage their own
    /// database lifecycle.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Saves one record inside a transaction.
    ///
    /// Checks the URL mapping first (`SELECT ... FOR UPDATE` so
    /// concurrent writers serialize on the row): a live row is a
    /// conflict, a soft-deleted row is resurrected in place under the
    /// new code and owner, an absent row is a plain insert. Any error
    /// aborts the enclosing transaction, which is exactly the
    /// all-or-nothing semantics batches need.
    async fn save_one(
        conn: &mut sqlx::PgConnection,
        owner_id: &str,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), AppError> {
        let row = sqlx::query(
            "SELECT short_code, original_url, owner_id, is_deleted
             FROM short_urls WHERE original_url = $1 FOR UPDATE",
        )
        .bind(original_url)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            let existing = row_to_stored(&row)?;
            if !existing.is_deleted {
                return Err(AppError::url_conflict(existing.short_code));
            }

            sqlx::query(
                "UPDATE short_urls
                 SET short_code = $1, owner_id = $2, is_deleted = FALSE
                 WHERE original_url = $3",
            )
            .bind(short_code)
            .bind(owner_id)
            .bind(original_url)
            .execute(conn)
            .await
            .map_err(map_unique_violation)?;

            return Ok(());
        }

        sqlx::query(
            "INSERT INTO short_urls (short_code, original_url, owner_id)
             VALUES ($1, $2, $3)",
        )
        .bind(short_code)
        .bind(original_url)
        .bind(owner_id)
        .execute(conn)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn save(
        &self,
        owner_id: &str,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::save_one(&mut *tx, owner_id, short_code, original_url).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_batch(&self, owner_id: &str, records: &[NewUrl]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Any conflict error drops the transaction, rolling back every
        // row inserted so far: all-or-nothing.
        for record in records {
            Self::save_one(
                &mut *tx,
                owner_id,
                &record.short_code,
                &record.original_url,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<StoredUrl, AppError> {
        let row = sqlx::query(
            "SELECT short_code, original_url, owner_id, is_deleted
             FROM short_urls WHERE short_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_stored(&row)?),
            None => Err(AppError::NotFound),
        }
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoredUrl>, AppError> {
        let rows = sqlx::query(
            "SELECT short_code, original_url, owner_id, is_deleted
             FROM short_urls
             WHERE owner_id = $1 AND NOT is_deleted
             ORDER BY short_code",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_stored(row).map_err(AppError::from))
            .collect()
    }

    async fn delete_batch(&self, owner_id: &str, codes: &[String]) -> Result<(), AppError> {
        // Non-matching codes fall out of the WHERE clause; a partial
        // match is expected, not an error.
        sqlx::query(
            "UPDATE short_urls SET is_deleted = TRUE
             WHERE owner_id = $1 AND NOT is_deleted AND short_code = ANY($2)",
        )
        .bind(owner_id)
        .bind(codes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS urls, COUNT(DISTINCT owner_id) AS users
             FROM short_urls WHERE NOT is_deleted",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StorageStats {
            urls: row.try_get::<i64, _>("urls").map_err(AppError::from)?,
            users: row.try_get::<i64, _>("users").map_err(AppError::from)?,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        self.pool.close().await;
        Ok(())
    }
}
