//! redb table definitions and storage manager
//!
//! The local cache is a flat string → string table, mirroring a browser's
//! persisted key-value storage.

use std::path::PathBuf;
use std::sync::Arc;

use redb::{Database, TableDefinition};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

// Key: cache key name, Value: serialized string payload
pub const LOCAL_CACHE: TableDefinition<&str, &str> = TableDefinition::new("local_cache");

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/reveal-cache.redb"),
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&config.db_path).map_err(StorageError::database)?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };

        storage.init_tables()?;

        Ok(storage)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        write_txn
            .open_table(LOCAL_CACHE)
            .map_err(StorageError::database)?;

        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Write several key-value pairs in one transaction
    pub fn put_all(
        &self,
        table: TableDefinition<&str, &str>,
        entries: &[(&str, &str)],
    ) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(StorageError::database)?;
            }
        }

        write_txn.commit().map_err(StorageError::database)?;

        Ok(())
    }

    /// Get a value from a table
    pub fn get(
        &self,
        table: TableDefinition<&str, &str>,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;

        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let value = table
            .get(key)
            .map_err(StorageError::database)?
            .map(|v| v.value().to_string());

        Ok(value)
    }

    /// Delete a key from a table
    pub fn delete(
        &self,
        table: TableDefinition<&str, &str>,
        key: &str,
    ) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        let removed = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table.remove(key).map_err(StorageError::database)?.is_some()
        };

        write_txn.commit().map_err(StorageError::database)?;

        Ok(removed)
    }
}
