//! Backing store abstraction for catalogs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use raster_common::DatasetMetadata;

use crate::error::{CatalogError, Result};
use crate::keys::KeyTuple;
use crate::memory::MemoryMetaStore;
use crate::query::{KeyFilter, Page};
use crate::schema::KeySchema;
use crate::sqlite::SqliteMetaStore;

/// Version and key schema persisted by a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogInfo {
    pub version: String,
    pub schema: KeySchema,
}

/// How a store should treat a location that holds no catalog yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Only open existing catalogs.
    Existing,
    /// Allow creating the underlying storage.
    Create,
}

/// Connection settings shared by backing stores.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long to wait for a connection.
    pub connect_timeout: Duration,
    /// How long a session waits for another session's write lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(10),
        }
    }
}

/// A location that can hold one catalog.
#[async_trait]
pub trait MetaStore: Send + Sync + fmt::Debug {
    /// Short backend name, used in the display form.
    fn driver_name(&self) -> &'static str;

    /// Normalized identity of the catalog location.
    fn path(&self) -> &str;

    /// Start a unit of work. Nothing becomes visible to other connections
    /// before [`StoreConnection::commit`].
    ///
    /// Units of work that write are serialized by the store: a second writer
    /// waits for the first to finish instead of failing.
    async fn begin(&self, mode: OpenMode) -> Result<Box<dyn StoreConnection>>;
}

/// One open unit of work against a backing store.
///
/// Dropping a connection without committing discards its writes.
#[async_trait]
pub trait StoreConnection: Send {
    /// Stored version and schema, or `None` if no catalog exists here.
    async fn read_info(&mut self) -> Result<Option<CatalogInfo>>;

    /// Create the catalog tables for `schema` and stamp `version`.
    async fn initialize(&mut self, schema: &KeySchema, version: &str) -> Result<()>;

    /// Replace the stored version.
    async fn write_version(&mut self, version: &str) -> Result<()>;

    /// Locators matching `filter`, ordered by key tuple and paginated.
    async fn datasets(
        &mut self,
        schema: &KeySchema,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<Vec<(KeyTuple, String)>>;

    /// Locator of one dataset.
    async fn dataset_path(&mut self, schema: &KeySchema, keys: &KeyTuple)
        -> Result<Option<String>>;

    /// Stored metadata of one dataset.
    async fn metadata(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<Option<DatasetMetadata>>;

    /// Insert or replace a dataset. `None` metadata clears any stored record.
    async fn upsert(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
        path: &str,
        metadata: Option<&DatasetMetadata>,
    ) -> Result<()>;

    /// Store metadata for an existing dataset.
    async fn put_metadata(
        &mut self,
        schema: &KeySchema,
        keys: &KeyTuple,
        metadata: &DatasetMetadata,
    ) -> Result<()>;

    /// Remove a dataset and its metadata. Returns whether it existed.
    async fn remove(&mut self, schema: &KeySchema, keys: &KeyTuple) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Open a backing store from a catalog URL.
///
/// Supported forms:
/// - `memory://` or `memory://name`: fresh in-memory store
/// - `sqlite::memory:`: in-memory SQLite database
/// - `sqlite:///abs/path.db`, `sqlite://rel/path.db`, `file:///abs/path.db`
/// - a plain filesystem path (SQLite)
pub async fn open_store(url: &str, options: &StoreOptions) -> Result<Arc<dyn MetaStore>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CatalogError::InvalidUrl("empty catalog url".to_string()));
    }

    if let Some(name) = url.strip_prefix("memory://") {
        return Ok(Arc::new(MemoryMetaStore::named(name)));
    }

    if url == "sqlite::memory:" {
        return Ok(Arc::new(SqliteMetaStore::open_memory().await?));
    }

    let path = if let Some(rest) = url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = url.strip_prefix("file://") {
        rest
    } else if url.contains("://") {
        return Err(CatalogError::InvalidUrl(format!(
            "unsupported scheme in '{}'",
            url
        )));
    } else {
        url
    };

    if path.is_empty() {
        return Err(CatalogError::InvalidUrl(format!("no path in '{}'", url)));
    }

    Ok(Arc::new(SqliteMetaStore::new(path, options.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_schemes() {
        let options = StoreOptions::default();

        let memory = open_store("memory://scratch", &options).await.unwrap();
        assert_eq!(memory.driver_name(), "MemoryMetaStore");
        assert_eq!(memory.path(), "memory://scratch");

        let sqlite = open_store("sqlite:///tmp/catalog.db", &options).await.unwrap();
        assert_eq!(sqlite.driver_name(), "SqliteMetaStore");
        assert_eq!(sqlite.path(), "/tmp/catalog.db");

        assert!(matches!(
            open_store("postgres://localhost/db", &options).await,
            Err(CatalogError::InvalidUrl(_))
        ));
        assert!(matches!(
            open_store("  ", &options).await,
            Err(CatalogError::InvalidUrl(_))
        ));
    }
}
