//! Picks a usable image database file.
//!
//! When the primary file is locked by another process, numbered backups
//! next to it (`allimages.meta.1.db`, `allimages.meta.2.db`, ...) are tried
//! in order. If none is usable, a rebuild is scheduled instead of failing.

use rusqlite::{Connection, ErrorCode, OpenFlags};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::schema::SCHEMA_VERSION;

/// Highest backup number probed.
pub const MAX_BACKUPS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Ready,
    Missing,
    Locked,
    SchemaMismatch(i64),
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseLocation {
    pub path: PathBuf,
    /// The file must be (re)initialized before use.
    pub needs_rebuild: bool,
}

/// `dir/name.ext` → `dir/name.<n>.ext`
pub fn backup_path(primary: &Path, n: u32) -> PathBuf {
    let stem = primary.file_stem().unwrap_or_default();
    let mut name = OsString::from(stem);
    name.push(format!(".{}", n));
    if let Some(ext) = primary.extension() {
        name.push(".");
        name.push(ext);
    }
    primary.with_file_name(name)
}

fn is_lock_error(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Checks whether `path` can be written to and carries the current schema.
pub fn probe(path: &Path) -> Probe {
    if !path.exists() {
        return Probe::Missing;
    }

    let conn = match Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    ) {
        Ok(conn) => conn,
        Err(e) => return Probe::Unreadable(e.to_string()),
    };
    if let Err(e) = conn.busy_timeout(Duration::ZERO) {
        return Probe::Unreadable(e.to_string());
    }

    if let Err(e) = conn.execute_batch("BEGIN IMMEDIATE; ROLLBACK;") {
        return if is_lock_error(&e) {
            Probe::Locked
        } else {
            Probe::Unreadable(e.to_string())
        };
    }

    match conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0)) {
        Ok(version) if version == SCHEMA_VERSION => Probe::Ready,
        Ok(version) => Probe::SchemaMismatch(version),
        Err(e) if is_lock_error(&e) => Probe::Locked,
        Err(e) => Probe::Unreadable(e.to_string()),
    }
}

/// Decides which file to use for the image database at `primary`.
pub fn locate(primary: &Path) -> DatabaseLocation {
    let found = |path: &Path, needs_rebuild: bool| DatabaseLocation {
        path: path.to_path_buf(),
        needs_rebuild,
    };

    match probe(primary) {
        Probe::Ready => return found(primary, false),
        Probe::Missing => return found(primary, true),
        Probe::SchemaMismatch(version) => {
            info!(
                "Image database {} has schema {} (want {}), rebuilding",
                primary.display(),
                version,
                SCHEMA_VERSION
            );
            return found(primary, true);
        }
        Probe::Locked => warn!("Image database {} is locked, trying backups", primary.display()),
        Probe::Unreadable(e) => warn!(
            "Image database {} is unavailable ({}), trying backups",
            primary.display(),
            e
        ),
    }

    let mut rebuild_slot = None;
    for n in 1..=MAX_BACKUPS {
        let candidate = backup_path(primary, n);
        match probe(&candidate) {
            Probe::Ready => {
                info!("Using backup image database {}", candidate.display());
                return found(&candidate, false);
            }
            Probe::Locked => debug!("Backup {} is locked too", candidate.display()),
            other => {
                debug!("Backup {} not usable: {:?}", candidate.display(), other);
                rebuild_slot.get_or_insert(candidate);
            }
        }
    }

    match rebuild_slot {
        Some(path) => {
            warn!("No usable backup; rebuilding image database at {}", path.display());
            DatabaseLocation {
                path,
                needs_rebuild: true,
            }
        }
        None => found(primary, true),
    }
}
