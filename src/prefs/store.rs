//! Persistent preference storage.

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::error::PreferenceResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS preferences (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Key-value backing store for preferences.
pub trait PreferenceStore {
    fn get(&self, name: &str) -> PreferenceResult<Option<String>>;

    fn set(&self, name: &str, value: &str) -> PreferenceResult<()>;

    /// All persisted preferences, ordered by name.
    fn entries(&self) -> PreferenceResult<Vec<(String, String)>>;
}

/// Preferences kept in a single SQLite file.
///
/// A connection is opened per operation so that a missing or unreadable
/// file only affects the call that touches it.
#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    path: PathBuf,
}

impl SqlitePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_read(&self) -> PreferenceResult<Option<Connection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Some(conn))
    }

    fn open_write(&self) -> PreferenceResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, name: &str) -> PreferenceResult<Option<String>> {
        let Some(conn) = self.open_read()? else {
            return Ok(None);
        };
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE name = ?",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, name: &str, value: &str) -> PreferenceResult<()> {
        let conn = self.open_write()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO preferences (name, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            rusqlite::params![name, value, now],
        )?;
        Ok(())
    }

    fn entries(&self) -> PreferenceResult<Vec<(String, String)>> {
        let Some(conn) = self.open_read()? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare("SELECT name, value FROM preferences ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
