//! XYZ tile addressing on the Web Mercator grid.

use crate::{BoundingBox, WEB_MERCATOR_EXTENT};
use serde::{Deserialize, Serialize};

/// A tile coordinate (z/x/y) with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parse "z/x/y".
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('/').map(|p| p.parse::<u32>().ok());
        let coord = Self::new(parts.next()??, parts.next()??, parts.next()??);
        if parts.next().is_some() || !coord.is_valid() {
            return None;
        }
        Some(coord)
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.z.min(31)
    }

    /// True when x and y address a tile that exists at this zoom level.
    pub fn is_valid(&self) -> bool {
        self.z <= 30 && (self.x as u64) < self.tiles_per_axis() && (self.y as u64) < self.tiles_per_axis()
    }

    /// Tile footprint in Web Mercator meters.
    pub fn mercator_bounds(&self) -> BoundingBox {
        let n = self.tiles_per_axis() as f64;
        let size = 2.0 * WEB_MERCATOR_EXTENT / n;

        let min_x = -WEB_MERCATOR_EXTENT + self.x as f64 * size;
        let max_y = WEB_MERCATOR_EXTENT - self.y as f64 * size;

        BoundingBox::new(min_x, max_y - size, min_x + size, max_y)
    }

    /// Tile footprint in lon/lat degrees.
    pub fn latlon_bounds(&self) -> BoundingBox {
        let n = self.tiles_per_axis() as f64;

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * self.y as f64 / n))
            .sinh()
            .atan()
            .to_degrees();
        let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (self.y + 1) as f64 / n))
            .sinh()
            .atan()
            .to_degrees();

        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }

    /// Tile containing the given lon/lat at a zoom level.
    pub fn from_lonlat(lon: f64, lat: f64, zoom: u32) -> Self {
        let n = (1u64 << zoom.min(30)) as f64;
        let max_index = n - 1.0;

        let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index) as u32;
        let lat_rad = lat.to_radians();
        let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max_index) as u32;

        Self { z: zoom, x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_tile_covers_world() {
        let bounds = TileCoord::new(0, 0, 0).mercator_bounds();
        assert_eq!(bounds.min_x, -WEB_MERCATOR_EXTENT);
        assert_eq!(bounds.max_x, WEB_MERCATOR_EXTENT);
        assert!((bounds.min_y + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert_eq!(bounds.max_y, WEB_MERCATOR_EXTENT);
    }

    #[test]
    fn test_zoom_one_quadrants() {
        let nw = TileCoord::new(1, 0, 0).mercator_bounds();
        assert_eq!(nw.min_x, -WEB_MERCATOR_EXTENT);
        assert!(nw.max_x.abs() < 1e-6);
        assert!(nw.min_y.abs() < 1e-6);

        let se = TileCoord::new(1, 1, 1).latlon_bounds();
        assert!((se.min_x - 0.0).abs() < 1e-9);
        assert!((se.max_x - 180.0).abs() < 1e-9);
        assert!(se.max_y.abs() < 1e-9);
    }

    #[test]
    fn test_parse_and_validate() {
        assert_eq!(TileCoord::parse("3/2/5"), Some(TileCoord::new(3, 2, 5)));
        assert_eq!(TileCoord::parse("1/2/0"), None);
        assert_eq!(TileCoord::parse("1/0"), None);
        assert_eq!(TileCoord::parse("1/0/0/0"), None);
    }

    #[test]
    fn test_from_lonlat() {
        let tile = TileCoord::from_lonlat(-122.4, 37.8, 10);
        assert_eq!(tile, TileCoord::new(10, 163, 395));
        assert!(tile.latlon_bounds().contains_point(-122.4, 37.8));
    }
}
