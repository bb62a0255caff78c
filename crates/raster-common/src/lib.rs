//! Common types shared across the raster catalog and tile engine crates.

pub mod bbox;
pub mod crs;
pub mod metadata;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::{CrsCode, WEB_MERCATOR_EXTENT};
pub use metadata::{DatasetMetadata, Polygon, PERCENTILE_COUNT};
pub use tile::TileCoord;
