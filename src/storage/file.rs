//! File-backed key-value store.
//!
//! Entries live in a single redb table. Every operation runs in its own
//! redb transaction on the blocking pool, so a write is durable once it
//! returns and a failed write leaves the file untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::storage::KeyValueStore;

/// The physical table holding every key in the store.
const ENTRIES: TableDefinition<'static, &str, &str> = TableDefinition::new("cache_entries");

fn storage_error(err: impl std::fmt::Display) -> CacheError {
    CacheError::StorageUnavailable(err.to_string())
}

/// Key-value store persisted to a redb database file. Survives process restarts.
pub struct FileStore {
    path: PathBuf,
    db: Arc<Database>,
}

impl FileStore {
    // == Open ==
    /// Opens or creates the database at `path`, creating parent directories.
    ///
    /// Fails with [`CacheError::StorageUnavailable`] if the file exists but is
    /// not a database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db_path = path.clone();
        let db = tokio::task::spawn_blocking(move || Database::create(db_path))
            .await
            .map_err(storage_error)?
            .map_err(storage_error)?;
        debug!("Opened cache database at {}", path.display());

        Ok(Self {
            path,
            db: Arc::new(db),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` against the database on the blocking pool.
    async fn blocking<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(storage_error)?
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

/// Removes `keys` in one transaction. Nothing is committed if any removal fails.
fn remove_keys(db: &Database, keys: &[String]) -> Result<()> {
    let tx = db.begin_write().map_err(storage_error)?;
    {
        let mut table = tx.open_table(ENTRIES).map_err(storage_error)?;
        for key in keys {
            table.remove(key.as_str()).map_err(storage_error)?;
        }
    }
    tx.commit().map_err(storage_error)
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |db| {
            let tx = db.begin_write().map_err(storage_error)?;
            {
                let mut table = tx.open_table(ENTRIES).map_err(storage_error)?;
                table
                    .insert(key.as_str(), value.as_str())
                    .map_err(storage_error)?;
            }
            tx.commit().map_err(storage_error)
        })
        .await
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.blocking(move |db| {
            let tx = db.begin_read().map_err(storage_error)?;
            let table = match tx.open_table(ENTRIES) {
                Ok(table) => table,
                // Nothing written yet
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(err) => return Err(storage_error(err)),
            };
            let value = table.get(key.as_str()).map_err(storage_error)?;
            Ok(value.map(|guard| guard.value().to_string()))
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let keys = vec![key.to_string()];
        self.blocking(move |db| remove_keys(db, &keys)).await
    }

    async fn all_keys(&self) -> Result<Vec<String>> {
        self.blocking(|db| {
            let tx = db.begin_read().map_err(storage_error)?;
            let table = match tx.open_table(ENTRIES) {
                Ok(table) => table,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(err) => return Err(storage_error(err)),
            };
            let mut keys = Vec::new();
            for entry in table.iter().map_err(storage_error)? {
                let (key, _) = entry.map_err(storage_error)?;
                keys.push(key.value().to_string());
            }
            Ok(keys)
        })
        .await
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let keys = keys.to_vec();
        self.blocking(move |db| remove_keys(db, &keys)).await
    }
}
