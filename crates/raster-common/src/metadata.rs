//! Dataset metadata records stored by the catalog.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Number of percentiles kept per dataset (1st through 99th).
pub const PERCENTILE_COUNT: usize = 99;

/// A GeoJSON polygon. Ring coordinates are `[lon, lat]` pairs and every ring
/// is closed (first point repeated at the end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Polygon")]
pub struct Polygon {
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    /// Polygon with a single exterior ring. The ring is closed if needed.
    pub fn from_ring(mut ring: Vec<[f64; 2]>) -> Self {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Self {
            coordinates: vec![ring],
        }
    }

    /// Counter-clockwise rectangle covering a bounding box.
    pub fn rectangle(bbox: &BoundingBox) -> Self {
        Self::from_ring(vec![
            [bbox.min_x, bbox.min_y],
            [bbox.max_x, bbox.min_y],
            [bbox.max_x, bbox.max_y],
            [bbox.min_x, bbox.max_y],
        ])
    }

    pub fn exterior(&self) -> &[[f64; 2]] {
        self.coordinates.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bounding box of the exterior ring.
    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.exterior().iter().map(|p| (p[0], p[1])))
    }

    /// Unsigned area of the exterior ring (shoelace formula).
    pub fn area(&self) -> f64 {
        let ring = self.exterior();
        let twice: f64 = ring
            .windows(2)
            .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
            .sum();
        twice.abs() / 2.0
    }
}

/// Summary of a dataset's raster content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Minimum and maximum over valid samples.
    pub range: (f64, f64),
    /// Extent as (west, south, east, north) in lon/lat degrees.
    pub bounds: BoundingBox,
    /// Convex hull of the valid pixels in lon/lat degrees.
    pub convex_hull: Polygon,
    /// Share of pixels holding valid data, 0 to 100.
    pub valid_percentage: f64,
    /// 1st through 99th percentile of the valid samples, ascending.
    pub percentiles: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation.
    pub stdev: f64,
    /// Client supplied metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl DatasetMetadata {
    pub fn min(&self) -> f64 {
        self.range.0
    }

    pub fn max(&self) -> f64 {
        self.range.1
    }

    /// Bounds as a (west, south, east, north) tuple.
    pub fn bounds_tuple(&self) -> (f64, f64, f64, f64) {
        (
            self.bounds.min_x,
            self.bounds.min_y,
            self.bounds.max_x,
            self.bounds.max_y,
        )
    }

    /// Check the structural invariants of a record.
    pub fn validate(&self) -> Result<(), String> {
        if self.percentiles.len() != PERCENTILE_COUNT {
            return Err(format!(
                "expected {} percentiles, got {}",
                PERCENTILE_COUNT,
                self.percentiles.len()
            ));
        }

        if self.percentiles.windows(2).any(|w| w[0] > w[1]) {
            return Err("percentiles must be ascending".to_string());
        }

        let (min, max) = self.range;
        if !(min <= max) {
            return Err(format!("invalid range ({}, {})", min, max));
        }

        if !(self.bounds.min_x <= self.bounds.max_x && self.bounds.min_y <= self.bounds.max_y) {
            return Err(format!("invalid bounds {:?}", self.bounds_tuple()));
        }

        if !(0.0..=100.0).contains(&self.valid_percentage) {
            return Err(format!(
                "valid_percentage {} outside [0, 100]",
                self.valid_percentage
            ));
        }

        if self.stdev < 0.0 || self.stdev.is_nan() {
            return Err(format!("invalid stdev {}", self.stdev));
        }

        Ok(())
    }
}
