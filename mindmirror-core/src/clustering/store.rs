//! Per-user model blob persistence.
//!
//! Both backends replace a user's blob atomically: readers see either the
//! previous model or the new one, never a partial write.

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

const MODEL_FILE: &str = "kmeans_model.bin";

/// Key-value store for opaque model blobs.
pub trait ModelStore: Send + Sync {
    /// Replace the blob stored under `key`.
    fn save(&self, key: &str, blob: &[u8]) -> Result<()>;

    /// Fetch the blob stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

// ============================================
// Filesystem
// ============================================

/// Stores each blob at `<root>/<key>/kmeans_model.bin`.
pub struct FsModelStore {
    root: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob for `key`.
    pub fn model_path(&self, key: &str) -> PathBuf {
        self.root.join(directory_name(key)).join(MODEL_FILE)
    }
}

/// Keys made of `[A-Za-z0-9_-]` are used verbatim; anything else is hashed.
fn directory_name(key: &str) -> String {
    let path_safe = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if path_safe {
        key.to_string()
    } else {
        hex::encode(Sha256::digest(key.as_bytes()))
    }
}

impl ModelStore for FsModelStore {
    fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.model_path(key);
        let dir = path
            .parent()
            .ok_or_else(|| Error::ModelStore(format!("no parent directory for {path:?}")))?;
        std::fs::create_dir_all(dir)?;

        let tmp = dir.join(format!(
            ".{MODEL_FILE}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp, blob)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::info!(key, path = %path.display(), bytes = blob.len(), "Saved model");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.model_path(key);
        match std::fs::read(&path) {
            Ok(blob) => {
                tracing::debug!(key, path = %path.display(), "Loaded model");
                Ok(Some(blob))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(key, "No stored model");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================
// SQLite
// ============================================

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: one blob per user
    r#"
    CREATE TABLE IF NOT EXISTS cluster_models (
        user_id     TEXT PRIMARY KEY,
        model       BLOB NOT NULL,
        updated_at  DATETIME NOT NULL
    );
    "#,
];

/// Stores blobs in a `cluster_models` table keyed by user id.
pub struct SqliteModelStore {
    conn: Mutex<Connection>,
}

impl SqliteModelStore {
    /// Open or create a store at the given path and migrate it
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelStore for SqliteModelStore {
    fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.conn().execute(
            r#"
            INSERT INTO cluster_models (user_id, model, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                model = excluded.model,
                updated_at = excluded.updated_at
            "#,
            params![key, blob, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(key, bytes = blob.len(), "Saved model");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blob = self
            .conn()
            .query_row(
                "SELECT model FROM cluster_models WHERE user_id = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        if blob.is_none() {
            tracing::info!(key, "No stored model");
        }
        Ok(blob)
    }
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running model store migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {version}"))?;
        }
    }
    Ok(())
}
