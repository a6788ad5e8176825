//! SQLite-backed identity records.

use std::path::Path;

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{self, SharedConnection, StoreError};
use crate::util::now_string;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// A stored identity. `password_hash` never leaves the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Fields of an identity that other services and clients may see.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            user_id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[derive(Clone)]
pub struct UserStore {
    conn: SharedConnection,
}

impl UserStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open(path, SCHEMA).await?;
        Ok(Self { conn })
    }

    /// Insert a new identity and return its id. Duplicate username or email is a conflict.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64, StoreError> {
        let (username, email, password_hash) =
            (username.to_string(), email.to_string(), password_hash.to_string());
        db::with_conn(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![username, email, password_hash, now_string()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let username = username.to_string();
        db::with_conn(&self.conn, move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE username = ?1",
                    params![username],
                    User::from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        db::with_conn(&self.conn, move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE id = ?1",
                    params![id],
                    User::from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }
}
