//! Core types for tile requests and metadata computation.

use serde::{Deserialize, Serialize};

use raster_common::BoundingBox;

use crate::config::TileEngineConfig;
use crate::error::{Result, TileError};
use crate::raster::RasterInfo;

/// Parameters of a tile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRequest {
    /// Output extent in Web Mercator metres. `None` covers the whole raster
    /// in its native CRS.
    pub tile_bounds: Option<BoundingBox>,
    /// Output shape `[rows, cols]`.
    pub tile_size: Vec<usize>,
    /// Use nearest-neighbour resampling so output values are source values.
    pub preserve_values: bool,
    /// Compute on a worker and return a handle.
    pub asynchronous: bool,
}

impl Default for TileRequest {
    fn default() -> Self {
        Self {
            tile_bounds: None,
            tile_size: vec![256, 256],
            preserve_values: false,
            asynchronous: false,
        }
    }
}

impl TileRequest {
    /// Request for a Web Mercator extent with default settings.
    pub fn for_bounds(bounds: BoundingBox) -> Self {
        Self {
            tile_bounds: Some(bounds),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, rows: usize, cols: usize) -> Self {
        self.tile_size = vec![rows, cols];
        self
    }

    pub fn preserve_values(mut self, preserve: bool) -> Self {
        self.preserve_values = preserve;
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn interpolation(&self) -> InterpolationMethod {
        if self.preserve_values {
            InterpolationMethod::Nearest
        } else {
            InterpolationMethod::Bilinear
        }
    }

    /// Output shape `(rows, cols)`; fails unless exactly two non-zero
    /// dimensions were given.
    pub fn shape(&self) -> Result<(usize, usize)> {
        match self.tile_size.as_slice() {
            [rows, cols] if *rows > 0 && *cols > 0 => Ok((*rows, *cols)),
            _ => Err(TileError::InvalidTileSize(self.tile_size.clone())),
        }
    }
}

/// Interpolation method for tile resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor - fastest, preserves exact values
    Nearest,
    /// Bilinear over valid neighbours
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nearest" => Some(Self::Nearest),
            "bilinear" | "linear" => Some(Self::Bilinear),
            _ => None,
        }
    }
}

/// A fixed-size masked array of samples.
///
/// `data` is row-major; masked pixels hold NaN and have `mask == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterTile {
    pub data: Vec<f32>,
    pub mask: Vec<bool>,
    pub width: usize,
    pub height: usize,
}

impl RasterTile {
    /// Fully masked tile.
    pub fn empty(height: usize, width: usize) -> Self {
        Self {
            data: vec![f32::NAN; width * height],
            mask: vec![false; width * height],
            width,
            height,
        }
    }

    /// Tile from row-major samples; NaN samples are masked.
    pub fn from_values(data: Vec<f32>, height: usize, width: usize) -> Self {
        let mask = data.iter().map(|v| !v.is_nan()).collect();
        Self {
            data,
            mask,
            width,
            height,
        }
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Value at a pixel, `None` if masked or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let idx = row * self.width + col;
        if self.mask[idx] {
            Some(self.data[idx])
        } else {
            None
        }
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// Valid samples in row-major order.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data
            .iter()
            .zip(&self.mask)
            .filter(|(_, valid)| **valid)
            .map(|(v, _)| *v)
    }
}

/// Options controlling how dataset metadata is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOptions {
    /// Force (`Some(true)`) or forbid (`Some(false)`) the chunked pass.
    /// `None` picks based on raster size.
    pub use_chunks: Option<bool>,
    /// Decimate the raster to fit `(rows, cols)` before computing.
    pub max_shape: Option<(usize, usize)>,
}

impl MetadataOptions {
    pub fn chunked() -> Self {
        Self {
            use_chunks: Some(true),
            max_shape: None,
        }
    }

    pub fn exact() -> Self {
        Self {
            use_chunks: Some(false),
            max_shape: None,
        }
    }

    pub fn downsampled(rows: usize, cols: usize) -> Self {
        Self {
            use_chunks: None,
            max_shape: Some((rows, cols)),
        }
    }

    /// Pick the statistics pass for a raster.
    pub fn resolve(&self, info: &RasterInfo, config: &TileEngineConfig) -> Result<StatsPolicy> {
        match (self.use_chunks, self.max_shape) {
            (Some(true), Some(_)) => Err(TileError::ConflictingOptions(
                "use_chunks and max_shape are mutually exclusive".to_string(),
            )),
            (_, Some((rows, cols))) => {
                if rows == 0 || cols == 0 {
                    return Err(TileError::ConflictingOptions(format!(
                        "max_shape ({}, {}) must be non-zero",
                        rows, cols
                    )));
                }
                if info.height <= rows && info.width <= cols {
                    Ok(StatsPolicy::Exact)
                } else {
                    Ok(StatsPolicy::Downsampled {
                        max_shape: (rows, cols),
                    })
                }
            }
            (Some(true), None) => Ok(StatsPolicy::Chunked),
            (Some(false), None) => Ok(StatsPolicy::Exact),
            (None, None) => {
                if info.pixel_count() > config.chunked_metadata_threshold {
                    Ok(StatsPolicy::Chunked)
                } else {
                    Ok(StatsPolicy::Exact)
                }
            }
        }
    }
}

/// How statistics are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPolicy {
    /// Whole raster in memory, exact percentiles.
    Exact,
    /// Two streamed passes over storage chunks, histogram percentiles.
    Chunked,
    /// Nearest-neighbour decimation to fit `max_shape`, then exact.
    Downsampled { max_shape: (usize, usize) },
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::CrsCode;

    fn info(width: usize, height: usize) -> RasterInfo {
        RasterInfo {
            width,
            height,
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            crs: CrsCode::Epsg4326,
            chunk_shape: (64, 64),
            nodata: None,
        }
    }

    #[test]
    fn test_tile_shape_validation() {
        assert_eq!(TileRequest::default().shape().unwrap(), (256, 256));
        assert_eq!(TileRequest::default().with_size(10, 20).shape().unwrap(), (10, 20));

        for bad in [vec![], vec![256], vec![256, 0], vec![1, 2, 3]] {
            let request = TileRequest {
                tile_size: bad,
                ..TileRequest::default()
            };
            assert!(matches!(request.shape(), Err(TileError::InvalidTileSize(_))));
        }
    }

    #[test]
    fn test_policy_resolution() {
        let config = TileEngineConfig {
            chunked_metadata_threshold: 100,
            ..TileEngineConfig::default()
        };

        let small = info(10, 10);
        let large = info(20, 20);

        assert_eq!(
            MetadataOptions::default().resolve(&small, &config).unwrap(),
            StatsPolicy::Exact
        );
        assert_eq!(
            MetadataOptions::default().resolve(&large, &config).unwrap(),
            StatsPolicy::Chunked
        );
        assert_eq!(
            MetadataOptions::exact().resolve(&large, &config).unwrap(),
            StatsPolicy::Exact
        );
        assert_eq!(
            MetadataOptions::downsampled(5, 5).resolve(&small, &config).unwrap(),
            StatsPolicy::Downsampled { max_shape: (5, 5) }
        );
        assert_eq!(
            MetadataOptions::downsampled(50, 50).resolve(&large, &config).unwrap(),
            StatsPolicy::Exact
        );

        let conflicting = MetadataOptions {
            use_chunks: Some(true),
            max_shape: Some((5, 5)),
        };
        assert!(matches!(
            conflicting.resolve(&small, &config),
            Err(TileError::ConflictingOptions(_))
        ));
    }

    #[test]
    fn test_tile_accessors() {
        let mut values = vec![f32::NAN; 6];
        values[5] = 7.5;
        let tile = RasterTile::from_values(values, 2, 3);
        assert_eq!(tile.shape(), (2, 3));
        assert_eq!(tile.get(1, 2), Some(7.5));
        assert_eq!(tile.get(0, 0), None);
        assert_eq!(tile.get(5, 0), None);
        assert_eq!(tile.valid_count(), 1);
    }
}
