//! The raster driver: a catalog plus a tile engine.
//!
//! Every operation comes in two forms. The plain form opens its own
//! session and closes it when done (commit on success, rollback on error);
//! the `*_with` form runs inside a caller-provided [`Session`] so several
//! operations can share one unit of work.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use catalog::{
    migrate_session, Catalog, KeyFilter, KeyInput, KeySchema, KeyTuple, MigrationOutcome, Page,
    Session,
};
use raster_common::DatasetMetadata;
use tile_engine::{MetadataOptions, TileEngine, TileRequest, TileResponse};

use crate::config::DriverSettings;
use crate::error::{DriverError, Result};

/// How `insert` obtains the metadata record of a dataset.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Store this record instead of computing one.
    pub metadata: Option<DatasetMetadata>,
    /// Register only the locator. Metadata is computed on first access.
    pub skip_metadata: bool,
    /// Locator to store, when it differs from the path read for metadata.
    pub override_path: Option<String>,
    /// Client metadata stored alongside the computed fields.
    pub extra_metadata: Option<Map<String, Value>>,
    /// Statistics policy for computed metadata.
    pub compute: MetadataOptions,
}

impl InsertOptions {
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn skip_metadata(mut self) -> Self {
        self.skip_metadata = true;
        self
    }

    pub fn override_path(mut self, path: impl Into<String>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn extra_metadata(mut self, extra: Map<String, Value>) -> Self {
        self.extra_metadata = Some(extra);
        self
    }

    pub fn compute(mut self, options: MetadataOptions) -> Self {
        self.compute = options;
        self
    }
}

/// Outcome of reading a dataset's stored metadata.
enum Lookup {
    Found(DatasetMetadata),
    /// Registered without metadata.
    Bare { keys: KeyTuple, path: String },
    Missing,
}

/// Key-indexed raster datasets with metadata and tiles.
///
/// # Example
///
/// ```rust,ignore
/// let driver = RasterDriver::open("sqlite:///data/catalog.db", DriverSettings::from_env()).await?;
/// driver.create(&KeySchema::new(["sensor", "date"])?).await?;
/// driver.insert(["S2", "20240101"], "/data/s2.zarr", InsertOptions::default()).await?;
///
/// let metadata = driver.get_metadata(["S2", "20240101"]).await?;
/// let tile = driver
///     .get_raster_tile(["S2", "20240101"], &TileRequest::default())
///     .await?
///     .resolve()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RasterDriver {
    catalog: Catalog,
    engine: TileEngine,
    settings: DriverSettings,
}

impl RasterDriver {
    pub fn new(catalog: Catalog, engine: TileEngine, settings: DriverSettings) -> Self {
        Self {
            catalog,
            engine,
            settings,
        }
    }

    /// Driver over the catalog at `url`, reading Zarr rasters from the local
    /// filesystem.
    pub async fn open(url: &str, settings: DriverSettings) -> Result<Self> {
        settings.validate().map_err(DriverError::Config)?;
        let catalog = Catalog::open(url, &settings.store_options()).await?;
        let engine = TileEngine::zarr(settings.engine.clone());
        Ok(Self::new(catalog, engine, settings))
    }

    /// Canonical identity of a catalog URL or path.
    pub async fn normalize_path(url: &str) -> Result<String> {
        let catalog = Catalog::open(url, &DriverSettings::default().store_options()).await?;
        Ok(catalog.path().to_string())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &TileEngine {
        &self.engine
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Normalized location of the catalog.
    pub fn path(&self) -> &str {
        self.catalog.path()
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Initialize an empty catalog bound to `schema`.
    #[instrument(skip_all, fields(catalog = %self))]
    pub async fn create(&self, schema: &KeySchema) -> Result<()> {
        self.catalog.create(schema).await?;
        Ok(())
    }

    /// Open a session with a version check.
    pub async fn connect(&self) -> Result<Session> {
        Ok(self.catalog.connect(true).await?)
    }

    /// Restamp the catalog with `target` (default: the engine version).
    #[instrument(skip(self), fields(catalog = %self))]
    pub async fn migrate(&self, target: Option<&str>) -> Result<MigrationOutcome> {
        let outcome = self.catalog.migrate(target).await?;
        info!(
            from = %outcome.from,
            to = %outcome.to,
            changed = outcome.changed,
            "Catalog migration finished"
        );
        Ok(outcome)
    }

    pub async fn migrate_with(
        &self,
        session: &mut Session,
        target: Option<&str>,
    ) -> Result<MigrationOutcome> {
        Ok(migrate_session(session, target).await?)
    }

    // ========================================================================
    // Catalog queries
    // ========================================================================

    pub async fn db_version(&self) -> Result<String> {
        let session = self.connect().await?;
        let version = session.db_version().to_string();
        session.close(Ok(version)).await
    }

    /// Ordered `(key_name, description)` pairs.
    pub async fn get_keys(&self) -> Result<Vec<(String, String)>> {
        let session = self.connect().await?;
        let keys = session.keys();
        session.close(Ok(keys)).await
    }

    pub async fn key_names(&self) -> Result<Vec<String>> {
        let keys = self.get_keys().await?;
        Ok(keys.into_iter().map(|(name, _)| name).collect())
    }

    /// Locators of datasets matching `filter`, in key order.
    #[instrument(skip_all, fields(catalog = %self))]
    pub async fn get_datasets(
        &self,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<BTreeMap<KeyTuple, String>> {
        let mut session = self.connect().await?;
        let result = self.get_datasets_with(&mut session, filter, page).await;
        session.close(result).await
    }

    pub async fn get_datasets_with(
        &self,
        session: &mut Session,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<BTreeMap<KeyTuple, String>> {
        let datasets = session.datasets(filter, page).await?;
        debug!(count = datasets.len(), "Listed datasets");
        Ok(datasets)
    }

    /// Metadata of a dataset, computing and storing it first if the dataset
    /// was registered without. `None` if no dataset matches.
    ///
    /// The raster is read between two sessions so the catalog stays
    /// writable meanwhile. Concurrent callers may both compute; the last
    /// write wins.
    #[instrument(skip_all, fields(catalog = %self))]
    pub async fn get_metadata(
        &self,
        keys: impl Into<KeyInput>,
    ) -> Result<Option<DatasetMetadata>> {
        let mut session = self.connect().await?;
        let result = self.stored_metadata_with(&mut session, keys).await;
        let (keys, path) = match session.close(result).await? {
            Lookup::Found(metadata) => return Ok(Some(metadata)),
            Lookup::Missing => return Ok(None),
            Lookup::Bare { keys, path } => (keys, path),
        };

        let metadata = self.lazy_metadata(&keys, &path).await?;

        let mut session = self.connect().await?;
        let result = session.put_metadata(keys, &metadata).await;
        let stored = session.close(result).await?;
        // Deleted while the raster was being read
        Ok(stored.then_some(metadata))
    }

    pub async fn get_metadata_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
    ) -> Result<Option<DatasetMetadata>> {
        match self.stored_metadata_with(session, keys).await? {
            Lookup::Found(metadata) => Ok(Some(metadata)),
            Lookup::Missing => Ok(None),
            Lookup::Bare { keys, path } => {
                let metadata = self.lazy_metadata(&keys, &path).await?;
                session.put_metadata(keys, &metadata).await?;
                Ok(Some(metadata))
            }
        }
    }

    async fn stored_metadata_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
    ) -> Result<Lookup> {
        let keys = session.schema().normalize(keys)?;
        if let Some(metadata) = session.metadata(keys.clone()).await? {
            return Ok(Lookup::Found(metadata));
        }

        Ok(match session.dataset_path(keys.clone()).await? {
            Some(path) => Lookup::Bare { keys, path },
            None => Lookup::Missing,
        })
    }

    async fn lazy_metadata(&self, keys: &KeyTuple, path: &str) -> Result<DatasetMetadata> {
        let (rows, cols) = self.settings.lazy_loading_max_shape;
        info!(keys = ?keys, path = %path, "Computing missing metadata");
        self.compute_metadata(path, MetadataOptions::downsampled(rows, cols), None)
            .await
    }

    // ========================================================================
    // Catalog updates
    // ========================================================================

    /// Register or overwrite a dataset.
    ///
    /// Keys are validated before the raster is read. Metadata is computed
    /// from `path` unless `options` supplies a record or skips it, and
    /// before the write session opens, so the catalog is not locked during
    /// raster I/O.
    #[instrument(skip_all, fields(catalog = %self, path = %path))]
    pub async fn insert(
        &self,
        keys: impl Into<KeyInput>,
        path: &str,
        options: InsertOptions,
    ) -> Result<KeyTuple> {
        // The schema is fixed at creation, so keys checked here stay valid.
        let session = self.connect().await?;
        let keys = session.schema().normalize(keys);
        let keys = session.close(keys.map_err(DriverError::from)).await?;

        let (locator, metadata) = self.prepare_insert(path, options).await?;

        let mut session = self.connect().await?;
        let result = self
            .register_with(&mut session, keys, &locator, metadata)
            .await;
        session.close(result).await
    }

    pub async fn insert_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
        path: &str,
        options: InsertOptions,
    ) -> Result<KeyTuple> {
        let keys = session.schema().normalize(keys)?;
        let (locator, metadata) = self.prepare_insert(path, options).await?;
        self.register_with(session, keys, &locator, metadata).await
    }

    /// Locator and metadata record to store for `path`.
    async fn prepare_insert(
        &self,
        path: &str,
        options: InsertOptions,
    ) -> Result<(String, Option<DatasetMetadata>)> {
        let locator = options.override_path.as_deref().unwrap_or(path).to_string();

        let metadata = match options.metadata {
            Some(mut metadata) => {
                if let Some(extra) = options.extra_metadata {
                    for (key, value) in extra {
                        metadata.metadata.entry(key).or_insert(value);
                    }
                }
                Some(metadata)
            }
            None if options.skip_metadata => None,
            None => Some(
                self.compute_metadata(path, options.compute, options.extra_metadata)
                    .await?,
            ),
        };
        Ok((locator, metadata))
    }

    async fn register_with(
        &self,
        session: &mut Session,
        keys: KeyTuple,
        locator: &str,
        metadata: Option<DatasetMetadata>,
    ) -> Result<KeyTuple> {
        let keys = session.insert(keys, locator, metadata.as_ref()).await?;
        info!(
            keys = ?keys,
            locator = %locator,
            with_metadata = metadata.is_some(),
            "Registered dataset"
        );
        Ok(keys)
    }

    /// Remove a dataset. Returns whether it existed.
    #[instrument(skip_all, fields(catalog = %self))]
    pub async fn delete(&self, keys: impl Into<KeyInput>) -> Result<bool> {
        let mut session = self.connect().await?;
        let result = self.delete_with(&mut session, keys).await;
        session.close(result).await
    }

    pub async fn delete_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
    ) -> Result<bool> {
        Ok(session.delete(keys).await?)
    }

    // ========================================================================
    // Rasters
    // ========================================================================

    /// Compute metadata for the raster at `path` on the blocking pool.
    pub async fn compute_metadata(
        &self,
        path: &str,
        options: MetadataOptions,
        extra: Option<Map<String, Value>>,
    ) -> Result<DatasetMetadata> {
        let engine = self.engine.clone();
        let path = path.to_string();
        let metadata = tokio::task::spawn_blocking(move || {
            engine.compute_metadata(&path, &options, extra)
        })
        .await??;
        Ok(metadata)
    }

    /// Tile of the dataset registered under `keys`.
    ///
    /// The tile size is validated before the catalog is consulted.
    /// Asynchronous requests return a deferred handle as soon as the locator
    /// is known.
    #[instrument(skip_all, fields(catalog = %self))]
    pub async fn get_raster_tile(
        &self,
        keys: impl Into<KeyInput>,
        request: &TileRequest,
    ) -> Result<TileResponse> {
        request.shape()?;

        let mut session = self.connect().await?;
        let result = self.dataset_path_with(&mut session, keys).await;
        let locator = session.close(result).await?;

        self.tile_for_locator(locator, request).await
    }

    pub async fn get_raster_tile_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
        request: &TileRequest,
    ) -> Result<TileResponse> {
        request.shape()?;
        let locator = self.dataset_path_with(session, keys).await?;
        self.tile_for_locator(locator, request).await
    }

    async fn dataset_path_with(
        &self,
        session: &mut Session,
        keys: impl Into<KeyInput>,
    ) -> Result<String> {
        let keys = session.schema().normalize(keys)?;
        session
            .dataset_path(keys.clone())
            .await?
            .ok_or(DriverError::DatasetNotFound(keys))
    }

    async fn tile_for_locator(&self, locator: String, request: &TileRequest) -> Result<TileResponse> {
        if request.asynchronous {
            return Ok(self.engine.get_raster_tile(&locator, request)?);
        }

        let engine = self.engine.clone();
        let request = request.clone();
        let response =
            tokio::task::spawn_blocking(move || engine.get_raster_tile(&locator, &request))
                .await??;
        Ok(response)
    }
}

impl fmt::Display for RasterDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.catalog, f)
    }
}
