//! Scoped access to a catalog's backing store.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use uuid::Uuid;

use raster_common::DatasetMetadata;

use crate::error::{CatalogError, Result};
use crate::keys::{KeyInput, KeyTuple};
use crate::query::{KeyFilter, Page};
use crate::schema::KeySchema;
use crate::store::{CatalogInfo, MetaStore, OpenMode, StoreConnection};
use crate::version::check_compatible;

/// An open unit of work on a catalog.
///
/// All operations issued through one session run on the same connection, in
/// order. Work becomes visible to other sessions on [`Session::commit`];
/// dropping a session without committing rolls it back.
pub struct Session {
    id: Uuid,
    path: String,
    conn: Box<dyn StoreConnection>,
    info: CatalogInfo,
    verified: bool,
}

impl Session {
    pub(crate) async fn open(store: &dyn MetaStore, verify: bool) -> Result<Self> {
        let mut conn = store.begin(OpenMode::Existing).await?;
        let info = match conn.read_info().await? {
            Some(info) => info,
            None => {
                conn.rollback().await?;
                return Err(CatalogError::invalid_database(format!(
                    "no catalog found at {}",
                    store.path()
                )));
            }
        };

        let mut session = Self {
            id: Uuid::new_v4(),
            path: store.path().to_string(),
            conn,
            info,
            verified: false,
        };
        session.connect(verify)?;

        debug!(
            session = %session.id,
            path = %session.path,
            db_version = %session.info.version,
            verified = verify,
            "Opened catalog session"
        );
        Ok(session)
    }

    /// Re-enter an open session.
    ///
    /// Returns the same session; the version check runs only if `verify`
    /// is set and no earlier check has passed.
    pub fn connect(&mut self, verify: bool) -> Result<&mut Self> {
        if verify && !self.verified {
            check_compatible(&self.info.version)?;
            self.verified = true;
        }
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn db_version(&self) -> &str {
        &self.info.version
    }

    pub fn schema(&self) -> &KeySchema {
        &self.info.schema
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Ordered `(key_name, description)` pairs.
    pub fn keys(&self) -> Vec<(String, String)> {
        self.info.schema.describe()
    }

    /// Locators of matching datasets keyed by key tuple, in canonical order.
    pub async fn datasets(
        &mut self,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<BTreeMap<KeyTuple, String>> {
        filter.validate(&self.info.schema)?;
        page.validate()?;

        let rows = self.conn.datasets(&self.info.schema, filter, page).await?;
        Ok(rows.into_iter().collect())
    }

    /// Locator of one dataset.
    pub async fn dataset_path(&mut self, keys: impl Into<KeyInput>) -> Result<Option<String>> {
        let keys = self.info.schema.normalize(keys)?;
        self.conn.dataset_path(&self.info.schema, &keys).await
    }

    /// Stored metadata of one dataset.
    pub async fn metadata(
        &mut self,
        keys: impl Into<KeyInput>,
    ) -> Result<Option<DatasetMetadata>> {
        let keys = self.info.schema.normalize(keys)?;
        self.conn.metadata(&self.info.schema, &keys).await
    }

    /// Register or overwrite a dataset.
    ///
    /// Without metadata the entry is stored bare and any previous metadata
    /// record for the same keys is dropped.
    pub async fn insert(
        &mut self,
        keys: impl Into<KeyInput>,
        path: &str,
        metadata: Option<&DatasetMetadata>,
    ) -> Result<KeyTuple> {
        let keys = self.info.schema.normalize(keys)?;
        if let Some(metadata) = metadata {
            metadata.validate().map_err(CatalogError::InvalidMetadata)?;
        }

        self.conn
            .upsert(&self.info.schema, &keys, path, metadata)
            .await?;
        debug!(session = %self.id, keys = ?keys, path = %path, "Inserted dataset");
        Ok(keys)
    }

    /// Attach metadata to an existing dataset. Returns false if the dataset
    /// does not exist.
    pub async fn put_metadata(
        &mut self,
        keys: impl Into<KeyInput>,
        metadata: &DatasetMetadata,
    ) -> Result<bool> {
        let keys = self.info.schema.normalize(keys)?;
        metadata.validate().map_err(CatalogError::InvalidMetadata)?;

        if self
            .conn
            .dataset_path(&self.info.schema, &keys)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        self.conn
            .put_metadata(&self.info.schema, &keys, metadata)
            .await?;
        Ok(true)
    }

    /// Remove a dataset. Removing an absent dataset is not an error.
    pub async fn delete(&mut self, keys: impl Into<KeyInput>) -> Result<bool> {
        let keys = self.info.schema.normalize(keys)?;
        let removed = self.conn.remove(&self.info.schema, &keys).await?;
        debug!(session = %self.id, keys = ?keys, removed, "Deleted dataset");
        Ok(removed)
    }

    pub(crate) async fn set_version(&mut self, version: &str) -> Result<()> {
        self.conn.write_version(version).await?;
        self.info.version = version.to_string();
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        debug!(session = %self.id, "Committing catalog session");
        self.conn.commit().await
    }

    pub async fn rollback(self) -> Result<()> {
        debug!(session = %self.id, "Rolling back catalog session");
        self.conn.rollback().await
    }

    /// Finish the session according to the outcome of the work done in it:
    /// commit on success, roll back on failure.
    pub async fn close<T, E>(self, result: std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<CatalogError>,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let id = self.id;
                if let Err(rollback_err) = self.rollback().await {
                    warn!(session = %id, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("db_version", &self.info.version)
            .field("verified", &self.verified)
            .finish()
    }
}
