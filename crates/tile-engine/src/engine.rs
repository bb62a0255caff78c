//! High-level tile and metadata service.
//!
//! The `TileEngine` resolves locators through a [`RasterStore`] and runs the
//! tile pipeline on the result:
//!
//! ```text
//! get_raster_tile(locator, request)
//!      │
//!      ├─► validate tile size (before any I/O)
//!      ├─► RasterStore::open(locator)
//!      ├─► plan_tile: output grid, clip area, source window
//!      └─► render_tile: read window, resample in parallel rows
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = TileEngine::zarr(TileEngineConfig::default());
//!
//! let bounds = tile_bounds_for(&TileCoord::new(3, 4, 2));
//! let request = TileRequest::for_bounds(bounds).preserve_values(true);
//! let tile = engine.get_raster_tile("/data/scene.zarr", &request)?.resolve().await?;
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use raster_common::DatasetMetadata;

use crate::config::TileEngineConfig;
use crate::error::Result;
use crate::handle::{TileHandle, TileResponse};
use crate::projection::{plan_tile, render_tile};
use crate::raster::RasterSource;
use crate::stats::compute_metadata;
use crate::store::{RasterStore, ZarrRasterStore};
use crate::types::{MetadataOptions, RasterTile, TileRequest};

/// Tile and metadata computation over a raster store.
///
/// Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct TileEngine {
    config: TileEngineConfig,
    store: Arc<dyn RasterStore>,
}

impl TileEngine {
    pub fn new(config: TileEngineConfig, store: Arc<dyn RasterStore>) -> Self {
        Self { config, store }
    }

    /// Engine reading Zarr arrays from the local filesystem.
    pub fn zarr(config: TileEngineConfig) -> Self {
        Self::new(config, Arc::new(ZarrRasterStore))
    }

    pub fn config(&self) -> &TileEngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RasterStore> {
        &self.store
    }

    pub fn open(&self, locator: &str) -> Result<Arc<dyn RasterSource>> {
        self.store.open(locator)
    }

    /// A whole-raster request with the configured default tile size.
    pub fn default_request(&self) -> TileRequest {
        TileRequest {
            tile_size: self.config.default_tile_shape(),
            ..TileRequest::default()
        }
    }

    /// Compute a tile.
    ///
    /// Synchronous requests run on the calling thread and return
    /// `TileResponse::Ready`. Asynchronous requests are handed to the worker
    /// pool and return `TileResponse::Deferred` immediately; their errors
    /// surface when the handle is awaited. An invalid tile size fails
    /// straight away in both modes.
    pub fn get_raster_tile(&self, locator: &str, request: &TileRequest) -> Result<TileResponse> {
        let shape = request.shape()?;

        if request.asynchronous {
            let engine = self.clone();
            let locator = locator.to_string();
            let request = request.clone();
            let handle =
                TileHandle::spawn(move || engine.render(&locator, &request, shape));
            return Ok(TileResponse::Deferred(handle));
        }

        self.render(locator, request, shape).map(TileResponse::Ready)
    }

    fn render(
        &self,
        locator: &str,
        request: &TileRequest,
        shape: (usize, usize),
    ) -> Result<RasterTile> {
        let source = self.open(locator)?;
        let plan = plan_tile(
            source.info(),
            request.tile_bounds.as_ref(),
            shape,
            request.interpolation(),
        )?;

        debug!(
            locator = %locator,
            rows = plan.rows,
            cols = plan.cols,
            window_row = plan.window.row,
            window_col = plan.window.col,
            window_height = plan.window.height,
            window_width = plan.window.width,
            method = ?plan.method,
            "Rendering tile"
        );

        render_tile(source.as_ref(), &plan)
    }

    /// Compute the metadata record of the raster at `locator`.
    pub fn compute_metadata(
        &self,
        locator: &str,
        options: &MetadataOptions,
        extra: Option<Map<String, Value>>,
    ) -> Result<DatasetMetadata> {
        let source = self.open(locator)?;
        compute_metadata(source.as_ref(), options, extra, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TileError;
    use crate::raster::InMemoryRaster;
    use raster_common::{BoundingBox, CrsCode};
    use std::collections::HashMap;

    /// Store serving in-memory rasters by name.
    #[derive(Debug, Default)]
    struct MemoryStore {
        rasters: HashMap<String, InMemoryRaster>,
    }

    impl RasterStore for MemoryStore {
        fn open(&self, locator: &str) -> Result<Arc<dyn RasterSource>> {
            self.rasters
                .get(locator)
                .map(|r| Arc::new(r.clone()) as Arc<dyn RasterSource>)
                .ok_or_else(|| TileError::open_failed(locator))
        }
    }

    fn engine() -> TileEngine {
        let data = (0..64).map(|v| v as f32).collect();
        let raster = InMemoryRaster::new(
            data,
            8,
            8,
            BoundingBox::new(0.0, 0.0, 8.0, 8.0),
            CrsCode::Epsg4326,
        )
        .unwrap();

        let mut store = MemoryStore::default();
        store.rasters.insert("grid".to_string(), raster);
        TileEngine::new(TileEngineConfig::default(), Arc::new(store))
    }

    #[test]
    fn test_invalid_tile_size_before_io() {
        let engine = engine();
        let mut request = TileRequest::default();
        request.tile_size = vec![256];
        assert!(matches!(
            engine.get_raster_tile("missing", &request),
            Err(TileError::InvalidTileSize(_))
        ));

        let request = TileRequest::default().with_size(0, 4).asynchronous(true);
        assert!(matches!(
            engine.get_raster_tile("missing", &request),
            Err(TileError::InvalidTileSize(_))
        ));
    }

    #[test]
    fn test_sync_tile() {
        let engine = engine();
        let request = TileRequest::default().with_size(8, 8).preserve_values(true);
        let tile = engine
            .get_raster_tile("grid", &request)
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(tile.get(0, 0), Some(0.0));
        assert_eq!(tile.get(7, 7), Some(63.0));
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let engine = engine();
        let request = TileRequest::default().with_size(5, 7);
        let sync = engine
            .get_raster_tile("grid", &request)
            .unwrap()
            .into_ready()
            .unwrap();

        let response = engine
            .get_raster_tile("grid", &request.clone().asynchronous(true))
            .unwrap();
        assert!(response.is_deferred());
        assert_eq!(response.resolve().await.unwrap(), sync);
    }

    #[tokio::test]
    async fn test_async_errors_surface_on_await() {
        let engine = engine();
        let request = TileRequest::default().asynchronous(true);
        let response = engine.get_raster_tile("missing", &request).unwrap();
        assert!(matches!(
            response.resolve().await,
            Err(TileError::OpenFailed(_))
        ));
    }

    #[test]
    fn test_default_request_uses_config() {
        let mut config = TileEngineConfig::default();
        config.default_tile_size = (128, 64);
        let engine = TileEngine::zarr(config);
        assert_eq!(engine.default_request().tile_size, vec![128, 64]);
    }
}
