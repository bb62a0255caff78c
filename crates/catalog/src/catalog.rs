//! Catalog handle over a backing store.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::{CatalogError, Result};
use crate::memory::MemoryMetaStore;
use crate::schema::KeySchema;
use crate::session::Session;
use crate::store::{open_store, MetaStore, OpenMode, StoreOptions};
use crate::version::CATALOG_FORMAT_VERSION;

/// A dataset catalog at one location.
///
/// Cheap to clone; clones refer to the same backing store.
#[derive(Clone, Debug)]
pub struct Catalog {
    store: Arc<dyn MetaStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn MetaStore>) -> Self {
        Self { store }
    }

    /// Open the backing store named by a catalog URL (see [`open_store`]).
    pub async fn open(url: &str, options: &StoreOptions) -> Result<Self> {
        Ok(Self::new(open_store(url, options).await?))
    }

    /// Catalog in a fresh in-memory store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryMetaStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    /// Normalized location of the catalog.
    pub fn path(&self) -> &str {
        self.store.path()
    }

    pub fn driver_name(&self) -> &'static str {
        self.store.driver_name()
    }

    /// Initialize an empty catalog bound to `schema`, stamped with the
    /// current format version.
    pub async fn create(&self, schema: &KeySchema) -> Result<()> {
        let mut conn = self.store.begin(OpenMode::Create).await?;
        if conn.read_info().await?.is_some() {
            conn.rollback().await?;
            return Err(CatalogError::AlreadyInitialized(self.path().to_string()));
        }

        conn.initialize(schema, CATALOG_FORMAT_VERSION).await?;
        conn.commit().await?;

        info!(
            catalog = %self,
            keys = ?schema.names(),
            version = CATALOG_FORMAT_VERSION,
            "Created catalog"
        );
        Ok(())
    }

    /// Open a session. With `verify`, fail unless the stored version is
    /// compatible with this engine.
    pub async fn connect(&self, verify: bool) -> Result<Session> {
        Session::open(self.store.as_ref(), verify).await
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')", self.driver_name(), self.path())
    }
}
