//! Coordinate reference system transformations.
//!
//! Implements the two projections rasters are stored in (WGS84 geographic
//! and spherical Web Mercator) from scratch without external dependencies.

pub mod mercator;
pub mod transform;

pub use mercator::{lonlat_to_mercator, mercator_to_lonlat, EARTH_RADIUS, MAX_LATITUDE};
pub use transform::{transform_bounds, Transformer, DEFAULT_DENSIFY_POINTS};
