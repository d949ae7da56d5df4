//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection pool and provides access to all repositories.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::job::JobRepository;
use super::lead::LeadRepository;
use super::pool::{DbError, SqlitePool};
use super::scrape_log::ScrapeLogRepository;
use super::source::SourceRepository;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::new(&settings.database_path());
/// ctx.init_schema().await?;
/// let sources = ctx.sources().get_enabled().await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (`sqlite:` prefix optional).
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: SqlitePool::new(url),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sources(&self) -> SourceRepository {
        SourceRepository::new(self.pool.clone())
    }

    pub fn leads(&self) -> LeadRepository {
        LeadRepository::new(self.pool.clone())
    }

    pub fn logs(&self) -> ScrapeLogRepository {
        ScrapeLogRepository::new(self.pool.clone())
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.writer().await?;
        conn.batch_execute(include_str!("schema_sqlite.sql")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("ctx.db"));
        ctx.init_schema().await.unwrap();
        ctx.init_schema().await.unwrap();
        assert!(ctx.sources().get_all().await.unwrap().is_empty());
        assert_eq!(ctx.leads().count(None).await.unwrap(), 0);
    }
}
