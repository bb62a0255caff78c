//! Resolving dataset locators to rasters.

use std::sync::Arc;

use crate::error::Result;
use crate::raster::{RasterSource, ZarrRaster};

/// Opens rasters by locator.
pub trait RasterStore: Send + Sync + std::fmt::Debug {
    fn open(&self, locator: &str) -> Result<Arc<dyn RasterSource>>;
}

/// Locators are paths to Zarr V3 array directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZarrRasterStore;

impl RasterStore for ZarrRasterStore {
    fn open(&self, locator: &str) -> Result<Arc<dyn RasterSource>> {
        Ok(Arc::new(ZarrRaster::open_path(locator)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TileError;

    #[test]
    fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.zarr");
        let result = ZarrRasterStore.open(&missing.display().to_string());
        assert!(matches!(result, Err(TileError::OpenFailed(_))));
    }
}
