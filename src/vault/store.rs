//! SQLite-backed secret records.
//!
//! Every lookup, update and delete filters by both the record id and the owner id.
//! The owner column is a logical reference to an identity that lives in another
//! service's database; nothing here enforces it.

use std::path::Path;

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{self, SharedConnection, StoreError};
use crate::util::now_string;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS passwords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    site TEXT NOT NULL,
    username TEXT NOT NULL,
    encrypted_password TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, site, username)
);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, site, username, encrypted_password, created_at, updated_at FROM passwords";

/// One stored secret. `encrypted_password` is opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: i64,
    pub user_id: i64,
    pub site: String,
    pub username: String,
    pub encrypted_password: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SecretRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            site: row.get(2)?,
            username: row.get(3)?,
            encrypted_password: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

#[derive(Clone)]
pub struct SecretStore {
    conn: SharedConnection,
}

impl SecretStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open(path, SCHEMA).await?;
        Ok(Self { conn })
    }

    /// All records of `owner`, ordered by site then username.
    pub async fn list(&self, owner: i64) -> Result<Vec<SecretRecord>, StoreError> {
        db::with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE user_id = ?1 ORDER BY site, username",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![owner], SecretRecord::from_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    /// Insert a record and return its id. Fails with `Conflict` on a duplicate
    /// (owner, site, username).
    pub async fn create(
        &self,
        owner: i64,
        site: &str,
        username: &str,
        ciphertext: &str,
    ) -> Result<i64, StoreError> {
        let (site, username, ciphertext) =
            (site.to_string(), username.to_string(), ciphertext.to_string());
        db::with_conn(&self.conn, move |conn| {
            let now = now_string();
            conn.execute(
                "INSERT INTO passwords
                    (user_id, site, username, encrypted_password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![owner, site, username, ciphertext, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get(&self, id: i64, owner: i64) -> Result<Option<SecretRecord>, StoreError> {
        db::with_conn(&self.conn, move |conn| {
            let record = conn
                .query_row(
                    &format!("{} WHERE id = ?1 AND user_id = ?2", SELECT_COLUMNS),
                    params![id, owner],
                    SecretRecord::from_row,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Overwrite site, username and ciphertext and advance `updated_at`.
    /// Returns `false` if no record of `owner` has this id.
    pub async fn update(
        &self,
        id: i64,
        owner: i64,
        site: &str,
        username: &str,
        ciphertext: &str,
    ) -> Result<bool, StoreError> {
        let (site, username, ciphertext) =
            (site.to_string(), username.to_string(), ciphertext.to_string());
        db::with_conn(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE passwords
                 SET site = ?1, username = ?2, encrypted_password = ?3, updated_at = ?4
                 WHERE id = ?5 AND user_id = ?6",
                params![site, username, ciphertext, now_string(), id, owner],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Returns `false` if no record of `owner` has this id.
    pub async fn delete(&self, id: i64, owner: i64) -> Result<bool, StoreError> {
        db::with_conn(&self.conn, move |conn| {
            let changed = conn.execute(
                "DELETE FROM passwords WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Number of records held by `owner`.
    pub async fn count(&self, owner: i64) -> Result<i64, StoreError> {
        db::with_conn(&self.conn, move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM passwords WHERE user_id = ?1",
                params![owner],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
    }
}
