//! Error types for raster access and tile computation.

use thiserror::Error;

/// Errors that can occur while reading rasters, building tiles or computing
/// statistics.
#[derive(Error, Debug)]
pub enum TileError {
    /// The requested tile does not overlap the raster extent.
    #[error("tile bounds {requested} do not intersect raster bounds {raster}")]
    TileOutOfBounds { requested: String, raster: String },

    /// The requested output shape is not a non-empty 2-D shape.
    #[error("invalid tile size {0:?}: expected two non-zero dimensions")]
    InvalidTileSize(Vec<usize>),

    /// Failed to open the raster.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read pixel data.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// Raster exists but cannot be interpreted.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// Every pixel of the raster is masked.
    #[error("raster {0} contains no valid data")]
    NoValidData(String),

    /// Mutually exclusive options were combined.
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// A background worker went away without reporting a result.
    #[error("tile worker failed: {0}")]
    WorkerLost(String),

    /// The deferred request was cancelled before it ran.
    #[error("tile request was cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl TileError {
    pub fn out_of_bounds(requested: impl Into<String>, raster: impl Into<String>) -> Self {
        Self::TileOutOfBounds {
            requested: requested.into(),
            raster: raster.into(),
        }
    }

    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for TileError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRaster(err.to_string())
    }
}

/// Result type for tile engine operations.
pub type Result<T> = std::result::Result<T, TileError>;
