//! SQLite plumbing shared by the identity and secret stores.
//!
//! Each service owns one private database file. Connections are wrapped in a tokio
//! `Mutex` and all statements run under `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::ApiError;

pub type SharedConnection = Arc<Mutex<Connection>>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if is_unique_violation(&e) {
            Self::Conflict
        } else {
            Self::Sqlite(e)
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => ApiError::Conflict("Record already exists".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Open (or create) the database at `path` and apply `schema`.
pub async fn open(path: &Path, schema: &'static str) -> Result<SharedConnection, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Task(format!("Failed to create db dir: {}", e)))?;
        }
    }

    let path = path.to_path_buf();
    let conn = tokio::task::spawn_blocking(move || {
        let conn = Connection::open(&path)?;
        conn.execute_batch(schema)?;
        Ok::<_, StoreError>(conn)
    })
    .await??;

    Ok(Arc::new(Mutex::new(conn)))
}

/// Run `f` against the connection on the blocking pool.
pub async fn with_conn<T, F>(conn: &SharedConnection, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        f(&conn)
    })
    .await?
}
