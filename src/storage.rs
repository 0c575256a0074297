use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const FAVORITES_KEY: &str = "favorites";
const COMMENTS_KEY_PREFIX: &str = "comments_";

pub fn comments_key(item_id: &str) -> String {
    format!("{COMMENTS_KEY_PREFIX}{item_id}")
}

/// Raw string key-value backend. Values are opaque to the backend.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

/// Typed adapter over a [`KeyValueStore`]. Every stored value is a JSON array.
///
/// Reads never fail: a missing key, a backend error, or content that does not
/// decode all yield an empty sequence. Writes replace the whole value.
/// [`Store::update`] is stricter and surfaces backend read errors.
pub struct Store {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn open(opts: Options) -> Result<Self> {
        let backend = SqliteStore::open(opts)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.backend.get(key) {
            Ok(raw) => decode_or_empty(key, raw),
            Err(err) => {
                tracing::warn!(key, error = ?err, "storage: read failed, using empty value");
                Vec::new()
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, values: &[T]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write_unlocked(key, values)
    }

    /// Read-modify-write of one key. The closure always sees the freshest
    /// stored value; it returns whether the value changed and a result.
    /// Unchanged values are not written back. A backend read error aborts
    /// the cycle, so a failed read is never written over the stored value.
    pub fn update<T, R, F>(&self, key: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> (bool, R),
    {
        let _guard = self.write_lock.lock();
        let raw = self
            .backend
            .get(key)
            .with_context(|| format!("storage: read {key} for update"))?;
        let mut values = decode_or_empty::<T>(key, raw);
        let (changed, out) = f(&mut values);
        if changed {
            self.write_unlocked(key, &values)?;
        }
        Ok(out)
    }

    fn write_unlocked<T: Serialize>(&self, key: &str, values: &[T]) -> Result<()> {
        let encoded = serde_json::to_string(values)
            .with_context(|| format!("storage: encode value for {key}"))?;
        self.backend.set(key, &encoded)?;
        tracing::trace!(key, bytes = encoded.len(), "storage: wrote value");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.backend.get(key).ok().flatten()
    }
}

fn decode_or_empty<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!(key, error = %err, "storage: corrupt value, using empty value");
            Vec::new()
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("storage: query key {key}"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO kv (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write key {key}"))?;
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
        tracing::debug!(version, "storage: applied migration");
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("photo-gallery").join("gallery.db"))
}
