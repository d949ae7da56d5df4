//! SQLite connection handling.
//!
//! Connections are created on demand. Readers run concurrently under WAL;
//! writers go through a process-wide lock so concurrent harvests and the
//! scheduler never fight over the database write lock.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::util::connection_error;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 30000; PRAGMA synchronous = NORMAL;";

/// SQLite connection pool (lightweight - creates connections on demand).
#[derive(Clone)]
pub struct SqlitePool {
    database_url: String,
    write_lock: Arc<Mutex<()>>,
}

impl SqlitePool {
    /// Create a new SQLite pool.
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection for reads.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(connection_error)?;
        conn.batch_execute(CONNECTION_PRAGMAS).await?;
        Ok(conn)
    }

    /// Get a connection that holds the write lock until dropped.
    pub async fn writer(&self) -> Result<WriteConn, DbError> {
        let guard = self.write_lock.clone().lock_owned().await;
        let conn = self.get().await?;
        Ok(WriteConn {
            conn,
            _guard: guard,
        })
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// A connection holding the process-wide write lock.
pub struct WriteConn {
    conn: SqliteConn,
    _guard: OwnedMutexGuard<()>,
}

impl Deref for WriteConn {
    type Target = SqliteConn;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for WriteConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_prefix_stripped() {
        let pool = SqlitePool::new("sqlite:/tmp/leads.db");
        assert_eq!(pool.database_url(), "/tmp/leads.db");
        assert_eq!(SqlitePool::new("leads.db").database_url(), "leads.db");
    }

    #[tokio::test]
    async fn test_writers_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::from_path(&dir.path().join("lock.db"));

        let first = pool.writer().await.unwrap();
        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.writer().await.map(|_| ()) });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap().unwrap();
    }
}
