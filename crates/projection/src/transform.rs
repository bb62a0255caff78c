//! Point and bounding box transformations between supported CRSs.

use raster_common::{BoundingBox, CrsCode};

use crate::mercator::{lonlat_to_mercator, mercator_to_lonlat};

/// Number of intermediate points sampled along each edge when transforming
/// a bounding box.
pub const DEFAULT_DENSIFY_POINTS: usize = 21;

/// Transforms coordinates from one CRS to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformer {
    from: CrsCode,
    to: CrsCode,
}

impl Transformer {
    pub fn new(from: CrsCode, to: CrsCode) -> Self {
        Self { from, to }
    }

    pub fn source(&self) -> CrsCode {
        self.from
    }

    pub fn target(&self) -> CrsCode {
        self.to
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transform a single `(x, y)` coordinate.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match (self.from, self.to) {
            (CrsCode::Epsg4326, CrsCode::Epsg3857) => lonlat_to_mercator(x, y),
            (CrsCode::Epsg3857, CrsCode::Epsg4326) => mercator_to_lonlat(x, y),
            _ => (x, y),
        }
    }

    /// Transform a bounding box, sampling `densify_pts` extra points per edge
    /// so curved edges are enclosed.
    pub fn transform_bounds(&self, bbox: &BoundingBox, densify_pts: usize) -> BoundingBox {
        if self.is_identity() {
            return *bbox;
        }

        let steps = densify_pts + 1;
        let mut points = Vec::with_capacity(4 * steps);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = bbox.min_x + t * bbox.width();
            let y = bbox.min_y + t * bbox.height();
            points.push(self.transform(x, bbox.min_y));
            points.push(self.transform(x, bbox.max_y));
            points.push(self.transform(bbox.min_x, y));
            points.push(self.transform(bbox.max_x, y));
        }

        // Non-empty since the loop runs at least twice.
        BoundingBox::enclosing(points).unwrap_or(*bbox)
    }
}

/// Transform a bounding box between CRSs.
pub fn transform_bounds(
    bbox: &BoundingBox,
    from: CrsCode,
    to: CrsCode,
    densify_pts: usize,
) -> BoundingBox {
    Transformer::new(from, to).transform_bounds(bbox, densify_pts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::WEB_MERCATOR_EXTENT;

    #[test]
    fn test_identity() {
        let t = Transformer::new(CrsCode::Epsg3857, CrsCode::Epsg3857);
        assert!(t.is_identity());
        assert_eq!(t.transform(12.5, -3.0), (12.5, -3.0));
    }

    #[test]
    fn test_world_bounds_to_mercator() {
        let world = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let merc = transform_bounds(
            &world,
            CrsCode::Epsg4326,
            CrsCode::Epsg3857,
            DEFAULT_DENSIFY_POINTS,
        );
        assert!((merc.min_x + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((merc.max_x - WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((merc.max_y - WEB_MERCATOR_EXTENT).abs() < 1e-3);
    }

    #[test]
    fn test_bounds_roundtrip() {
        let bbox = BoundingBox::new(-10.0, 35.0, 20.0, 60.0);
        let merc = transform_bounds(&bbox, CrsCode::Epsg4326, CrsCode::Epsg3857, 21);
        let back = transform_bounds(&merc, CrsCode::Epsg3857, CrsCode::Epsg4326, 21);
        assert!((back.min_x - bbox.min_x).abs() < 1e-9);
        assert!((back.min_y - bbox.min_y).abs() < 1e-9);
        assert!((back.max_x - bbox.max_x).abs() < 1e-9);
        assert!((back.max_y - bbox.max_y).abs() < 1e-9);
    }
}
