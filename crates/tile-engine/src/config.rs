//! Configuration for the tile engine.

use serde::{Deserialize, Serialize};

/// Rasters with more pixels than this use chunked statistics by default
/// (one 10980 x 10980 Sentinel-2 granule).
pub const DEFAULT_CHUNKED_METADATA_THRESHOLD: usize = 10980 * 10980;

/// Histogram resolution of the chunked percentile pass.
pub const DEFAULT_PERCENTILE_HISTOGRAM_BINS: usize = 65536;

/// Configuration for the tile engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEngineConfig {
    /// Output shape `(rows, cols)` used when a request gives none.
    pub default_tile_size: (usize, usize),

    /// Pixel count above which metadata is computed chunk by chunk unless
    /// the caller chooses a policy.
    pub chunked_metadata_threshold: usize,

    /// Number of histogram bins for chunked percentiles.
    pub percentile_histogram_bins: usize,
}

impl Default for TileEngineConfig {
    fn default() -> Self {
        Self {
            default_tile_size: (256, 256),
            chunked_metadata_threshold: DEFAULT_CHUNKED_METADATA_THRESHOLD,
            percentile_histogram_bins: DEFAULT_PERCENTILE_HISTOGRAM_BINS,
        }
    }
}

impl TileEngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTERCAT_DEFAULT_TILE_SIZE") {
            if let Some(shape) = parse_shape(&val) {
                config.default_tile_size = shape;
            }
        }

        if let Ok(val) = std::env::var("RASTERCAT_CHUNKED_METADATA_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                config.chunked_metadata_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("RASTERCAT_PERCENTILE_HISTOGRAM_BINS") {
            if let Ok(bins) = val.parse() {
                config.percentile_histogram_bins = bins;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_tile_size.0 == 0 || self.default_tile_size.1 == 0 {
            return Err("default_tile_size must have non-zero dimensions".to_string());
        }

        if self.chunked_metadata_threshold == 0 {
            return Err("chunked_metadata_threshold must be > 0".to_string());
        }

        if self.percentile_histogram_bins < 2 {
            return Err("percentile_histogram_bins must be >= 2".to_string());
        }

        Ok(())
    }

    /// Default tile size as a `[rows, cols]` request shape.
    pub fn default_tile_shape(&self) -> Vec<usize> {
        vec![self.default_tile_size.0, self.default_tile_size.1]
    }
}

/// Parse a 2-D shape written as `ROWSxCOLS` or `ROWS,COLS`.
pub fn parse_shape(s: &str) -> Option<(usize, usize)> {
    let (rows, cols) = s.trim().split_once(|c: char| c == 'x' || c == 'X' || c == ',')?;
    Some((rows.trim().parse().ok()?, cols.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TileEngineConfig::default();
        assert_eq!(config.default_tile_size, (256, 256));
        assert_eq!(config.chunked_metadata_threshold, 120_560_400);
        assert_eq!(config.percentile_histogram_bins, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TileEngineConfig::default();
        config.default_tile_size = (0, 256);
        assert!(config.validate().is_err());

        let mut config = TileEngineConfig::default();
        config.percentile_histogram_bins = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("512x256"), Some((512, 256)));
        assert_eq!(parse_shape(" 64, 32 "), Some((64, 32)));
        assert_eq!(parse_shape("64"), None);
        assert_eq!(parse_shape("axb"), None);
    }
}
