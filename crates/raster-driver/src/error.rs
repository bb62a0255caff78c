//! Error types for the raster driver.

use catalog::CatalogError;
use thiserror::Error;
use tile_engine::TileError;

/// Errors returned by driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Catalog failure (schema, keys, version, backing store).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Raster access or computation failure.
    #[error(transparent)]
    Raster(#[from] TileError),

    /// No dataset is registered under the given keys.
    #[error("no dataset found for keys {0:?}")]
    DatasetNotFound(Vec<String>),

    /// A blocking task could not be joined.
    #[error("background task failed: {0}")]
    Task(String),

    /// Invalid driver settings.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for DriverError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
