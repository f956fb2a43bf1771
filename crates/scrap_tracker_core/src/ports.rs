//! crates/scrap_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the storage engine, the HTTP transport and the front end.

use async_trait::async_trait;
use crate::domain::{Record, RecordFields};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistent string key-value storage, the equivalent of browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Returns the full collection in insertion order.
    async fn list(&self) -> PortResult<Vec<Record>>;

    /// Assigns an id and timestamp, appends the record and persists the collection.
    async fn add(&self, fields: RecordFields) -> PortResult<Record>;

    /// Removes the record with the given id. Unknown ids leave the collection unchanged.
    async fn remove(&self, id: &str) -> PortResult<()>;
}

/// Access to the current session token for outbound requests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token(&self) -> PortResult<Option<String>>;

    /// Drops the persisted token and any in-memory session built on it.
    async fn clear(&self) -> PortResult<()>;
}

/// Forces the front end to a different location.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}
