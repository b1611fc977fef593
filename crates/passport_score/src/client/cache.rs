//! SQLite store for the last weights snapshot, keyed by a hash of the endpoint.

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A cached response body and when it was fetched (Unix seconds).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedBody {
    pub body: String,
    pub fetched_utc: i64,
}

pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open or create the cache at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                fetched_utc INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Hex SHA-256 of an endpoint URL.
    pub fn key_for(endpoint: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn load(&self, key: &str) -> Result<Option<CachedBody>, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let mut stmt = conn.prepare("SELECT body, fetched_utc FROM snapshots WHERE key = ?1")?;
        let row = stmt
            .query_row([key], |r| {
                Ok(CachedBody {
                    body: r.get(0)?,
                    fetched_utc: r.get(1)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Replace the snapshot stored under `key`.
    pub fn store(&self, key: &str, body: &str) -> Result<(), CacheError> {
        let fetched = time::OffsetDateTime::now_utc().unix_timestamp();
        let conn = self
            .conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (key, body, fetched_utc) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, body, fetched],
        )?;
        Ok(())
    }
}
