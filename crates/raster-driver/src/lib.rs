//! Raster catalog driver.
//!
//! Binds a [`catalog::Catalog`] of key-indexed datasets to a
//! [`tile_engine::TileEngine`]: datasets are registered under user-defined
//! keys, their metadata is computed on insert (or lazily on first access),
//! and tiles are requested by key.
//!
//! # Example
//!
//! ```ignore
//! use catalog::{KeyFilter, KeySchema, Page};
//! use raster_driver::{DriverSettings, InsertOptions, RasterDriver};
//!
//! let driver = RasterDriver::open("catalog.db", DriverSettings::from_env()).await?;
//! driver.create(&KeySchema::new(["sensor", "date"])?).await?;
//! driver.insert(["S2", "20240101"], "/data/s2.zarr", InsertOptions::default()).await?;
//!
//! let datasets = driver.get_datasets(&KeyFilter::new().eq("sensor", "S2"), Page::all()).await?;
//! ```

pub mod config;
pub mod driver;
pub mod error;

pub use config::DriverSettings;
pub use driver::{InsertOptions, RasterDriver};
pub use error::{DriverError, Result};
