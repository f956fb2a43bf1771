//! services/tracker/src/adapters/db.rs
//!
//! This module contains the SQLite storage adapter, which is the concrete implementation
//! of the `KeyValueStore` port from the `core` crate. It handles all interactions
//! with the database using `sqlx`.

use async_trait::async_trait;
use scrap_tracker_core::ports::{KeyValueStore, PortError, PortResult};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A storage adapter that implements the `KeyValueStore` port on top of SQLite.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Creates a new `SqliteStorage`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for the given URL.
    ///
    /// A single connection is used: the storage has exactly one writer, and
    /// `sqlite::memory:` databases are per-connection.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Waits for the pool to shut down cleanly.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StorageRow {
    value: String,
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStore for SqliteStorage {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let row = sqlx::query_as::<_, StorageRow>("SELECT value FROM local_storage WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(row.map(|r| r.value))
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM local_storage WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SqliteStorage {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        storage.run_migrations().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn set_overwrites_and_remove_is_idempotent() {
        let storage = memory_db().await;
        assert_eq!(storage.get_item("authToken").await.unwrap(), None);

        storage.set_item("authToken", "first").await.unwrap();
        storage.set_item("authToken", "second").await.unwrap();
        assert_eq!(
            storage.get_item("authToken").await.unwrap().as_deref(),
            Some("second")
        );

        storage.remove_item("authToken").await.unwrap();
        storage.remove_item("authToken").await.unwrap();
        assert_eq!(storage.get_item("authToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("store.db").display());

        let storage = SqliteStorage::connect(&url).await.unwrap();
        storage.run_migrations().await.unwrap();
        storage.set_item("adminUser", "{}").await.unwrap();
        storage.close().await;

        let reopened = SqliteStorage::connect(&url).await.unwrap();
        reopened.run_migrations().await.unwrap();
        assert_eq!(
            reopened.get_item("adminUser").await.unwrap().as_deref(),
            Some("{}")
        );
    }
}
