//! Raster Tile Engine with Zarr V3 Support
//!
//! This crate reads single-band rasters stored as 2-D `float32` Zarr V3
//! arrays and provides:
//!
//! - **Tiles**: reprojection of a Web Mercator extent (or the whole raster)
//!   onto a fixed output grid, reading only the pixel window it needs
//! - **Metadata**: range, percentiles, moments, bounds and the convex hull
//!   of valid data, exact, chunk-streamed or downsampled
//! - **Deferred requests**: tiles computed on the rayon pool and awaited
//!   through a [`TileHandle`]
//!
//! # Architecture
//!
//! ```text
//! Tile Request
//!      │
//!      ▼
//! TileEngine::get_raster_tile(locator, request)
//!      │
//!      ├─► RasterStore::open(locator) ──► ZarrRaster
//!      │
//!      ├─► plan_tile: clip to raster extent, pick source window
//!      │
//!      └─► render_tile: nearest / bilinear resampling
//!               │
//!               ▼
//!          RasterTile (values + mask)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tile_engine::{MetadataOptions, TileEngine, TileEngineConfig, TileRequest};
//!
//! let engine = TileEngine::zarr(TileEngineConfig::from_env());
//!
//! let metadata = engine.compute_metadata("/data/scene.zarr", &MetadataOptions::default(), None)?;
//! let tile = engine
//!     .get_raster_tile("/data/scene.zarr", &TileRequest::default())?
//!     .into_ready();
//! ```

pub mod config;
pub mod downsample;
pub mod engine;
pub mod error;
pub mod handle;
pub mod projection;
pub mod raster;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{parse_shape, TileEngineConfig};
pub use engine::TileEngine;
pub use error::{Result, TileError};
pub use handle::{TileHandle, TileResponse};
pub use self::projection::{
    bilinear_interpolate, nearest_interpolate, plan_tile, render_tile, tile_bounds_for, TilePlan,
};
pub use raster::{InMemoryRaster, PixelWindow, RasterInfo, RasterSource, ZarrRaster};
pub use stats::compute_metadata;
pub use store::{RasterStore, ZarrRasterStore};
pub use types::{InterpolationMethod, MetadataOptions, RasterTile, StatsPolicy, TileRequest};
