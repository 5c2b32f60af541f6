//! SQLite-backed storage.
//!
//! Separate reader/writer connections give `Store` interior mutability
//! through two `Mutex<Connection>` handles rather than one, so reads never
//! wait behind an in-flight write's lock acquisition on the same mutex.
//! All methods take `&self`; `Store` is `Send + Sync` and callers share it
//! behind an `Arc`.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

use super::migrations;

pub struct Store {
    pub(crate) writer: Mutex<Connection>,
    pub(crate) reader: Mutex<Connection>,
}

impl Store {
    fn configure_connection(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA cache_size = -16000;
             PRAGMA mmap_size = 134217728;",
        )?;
        Ok(())
    }

    /// Open (and migrate) the store at `db_path`, or the default per-user
    /// data directory when `None`.
    pub fn new(db_path: Option<PathBuf>) -> StoreResult<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
        }

        Self::configure_connection(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)
            .map_err(|e| StoreError::Init(format!("migration failed: {e}")))?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn default_path() -> StoreResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "taskgraph", "taskgraph")
            .ok_or_else(|| StoreError::Init("could not determine data directory".into()))?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("taskgraph.db"))
    }

    /// Lock and return the write connection. Handlers that mutate the graph
    /// take this; callers hold the guard only for the duration of one
    /// request so the lock never spans an agent round-trip.
    pub fn writer(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.writer.lock().expect("writer lock poisoned")
    }

    /// Lock and return the read-only connection, for handlers that never
    /// mutate (`next`, `context`, `query`, `status`, ...).
    pub fn reader(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.reader.lock().expect("reader lock poisoned")
    }
}

/// Generates a short, globally-unique node/edge id (first 12 hex chars of a
/// UUIDv4 — short enough for an agent to retype, long enough to not collide
/// within a project's lifetime).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
