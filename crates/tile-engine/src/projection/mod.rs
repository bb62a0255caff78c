//! Reprojection and resampling of rasters onto tile grids.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{bilinear_interpolate, interpolate, nearest_interpolate};
pub use reproject::{plan_tile, render_tile, TilePlan};

use raster_common::{BoundingBox, TileCoord};

/// Web Mercator bounds of an XYZ tile, suitable as a request's
/// `tile_bounds`.
pub fn tile_bounds_for(tile: &TileCoord) -> BoundingBox {
    tile.mercator_bounds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::WEB_MERCATOR_EXTENT;

    #[test]
    fn test_tile_bounds_for() {
        // Tile 0/0/0 covers the world
        let bbox = tile_bounds_for(&TileCoord::new(0, 0, 0));
        assert!((bbox.min_x + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((bbox.max_y - WEB_MERCATOR_EXTENT).abs() < 1e-6);

        // North-east quadrant at zoom 1
        let bbox = tile_bounds_for(&TileCoord::new(1, 1, 0));
        assert!(bbox.min_x.abs() < 1e-6);
        assert!(bbox.min_y.abs() < 1e-6);
        assert!((bbox.max_x - WEB_MERCATOR_EXTENT).abs() < 1e-6);
    }
}
