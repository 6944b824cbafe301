//! SQLite backend: a single `kv` table in a WAL-mode database.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value;

use crate::core::errors::{IgdError, Result};
use crate::store::KeyValueStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| IgdError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .is_ok_and(|mode| mode.eq_ignore_ascii_case("wal"))
    }
}

fn decode(namespace: &str, key: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|error| IgdError::Store {
        context: "sqlite decode",
        details: format!("{namespace}/{key}: {error}"),
    })
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .prepare_cached("SELECT value FROM kv WHERE namespace = ?1 AND key = ?2")?
            .query_row(params![namespace, key], |row| row.get(0))
            .optional()?;
        raw.map(|raw| decode(namespace, key, &raw)).transpose()
    }

    fn get_all(&self, namespace: &str) -> Result<BTreeMap<String, Value>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key, value FROM kv WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, raw)| {
                let value = decode(namespace, &key, &raw)?;
                Ok((key, value))
            })
            .collect()
    }

    fn add(&self, namespace: &str, key: &str, value: Value) -> Result<bool> {
        let encoded = serde_json::to_string(&value)?;
        let inserted = self
            .conn
            .lock()
            .prepare_cached(
                "INSERT OR IGNORE INTO kv (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            )?
            .execute(params![namespace, key, encoded])?;
        Ok(inserted > 0)
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let encoded = serde_json::to_string(&value)?;
        self.conn
            .lock()
            .prepare_cached(
                "INSERT INTO kv (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(namespace, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
            )?
            .execute(params![namespace, key, encoded])?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .lock()
            .prepare_cached("DELETE FROM kv WHERE namespace = ?1 AND key = ?2")?
            .execute(params![namespace, key])?;
        Ok(removed > 0)
    }

    fn clear(&self, namespace: &str) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .prepare_cached("DELETE FROM kv WHERE namespace = ?1")?
            .execute(params![namespace])?;
        Ok(removed)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[IGD-SQLITE] WARNING: requested WAL mode but got '{mode}'");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (namespace, key)
        );",
    )?;
    Ok(())
}
