//! Common test fixtures: bounding boxes and Zarr rasters on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use raster_common::{BoundingBox, CrsCode};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

/// Common bounding box definitions for testing.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Europe bounding box
    pub const EUROPE: (f64, f64, f64, f64) = (-15.0, 35.0, 45.0, 72.0);

    /// A 10 x 10 degree scene east of the prime meridian
    pub const SCENE: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// A single-band `float32` Zarr V3 raster to be written for a test.
///
/// # Example
///
/// ```ignore
/// let dir = tempfile::tempdir()?;
/// let path = ZarrRasterFixture::new(create_test_grid(100, 80), 100, 80, bbox)
///     .chunk_shape(32, 32)
///     .write(&dir.path().join("scene.zarr"))?;
/// ```
#[derive(Debug, Clone)]
pub struct ZarrRasterFixture {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub bbox: BoundingBox,
    pub crs: CrsCode,
    pub chunk_shape: (usize, usize),
    pub nodata: Option<f32>,
    /// Skip the `bbox` attribute, producing an unreadable raster.
    pub omit_bbox: bool,
}

impl ZarrRasterFixture {
    pub fn new(data: Vec<f32>, width: usize, height: usize, bbox: BoundingBox) -> Self {
        Self {
            data,
            width,
            height,
            bbox,
            crs: CrsCode::Epsg4326,
            chunk_shape: (height, width),
            nodata: None,
            omit_bbox: false,
        }
    }

    pub fn crs(mut self, crs: CrsCode) -> Self {
        self.crs = crs;
        self
    }

    pub fn chunk_shape(mut self, rows: usize, cols: usize) -> Self {
        self.chunk_shape = (rows, cols);
        self
    }

    pub fn nodata(mut self, value: f32) -> Self {
        self.nodata = Some(value);
        self
    }

    pub fn without_bbox(mut self) -> Self {
        self.omit_bbox = true;
        self
    }

    /// Write the raster as a Zarr V3 array at `path` (no sharding, no
    /// compression) and return the path.
    pub fn write(&self, path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(path)?;
        let store = Arc::new(FilesystemStore::new(path)?);

        let mut attrs = serde_json::Map::new();
        if !self.omit_bbox {
            attrs.insert("bbox".to_string(), serde_json::json!(self.bbox.to_array()));
        }
        attrs.insert("crs".to_string(), serde_json::json!(self.crs.to_string()));
        if let Some(nodata) = self.nodata {
            attrs.insert("nodata".to_string(), serde_json::json!(nodata));
        }

        let array = ArrayBuilder::new(
            vec![self.height as u64, self.width as u64], // shape [rows, cols]
            DataType::Float32,
            vec![self.chunk_shape.0 as u64, self.chunk_shape.1 as u64].try_into()?,
            FillValue::from(f32::NAN),
        )
        .attributes(attrs)
        .build(store.clone(), "/")?;

        array.store_metadata()?;

        let subset = ArraySubset::new_with_start_shape(
            vec![0, 0],
            vec![self.height as u64, self.width as u64],
        )?;
        array.store_array_subset_elements(&subset, self.data.as_slice())?;

        Ok(path.to_path_buf())
    }
}

/// A Zarr raster written into its own temporary directory.
///
/// The directory is removed when the value is dropped.
pub struct TempRaster {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl TempRaster {
    pub fn write(fixture: &ZarrRasterFixture) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = fixture.write(&dir.path().join("raster.zarr"))?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as a dataset locator.
    pub fn locator(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_test_grid;

    #[test]
    fn test_write_fixture() {
        let bbox = BoundingBox::new(0.0, 0.0, 4.0, 2.0);
        let raster = TempRaster::write(
            &ZarrRasterFixture::new(create_test_grid(4, 2), 4, 2, bbox).chunk_shape(1, 2),
        )
        .unwrap();

        assert!(raster.path().join("zarr.json").is_file());
        assert!(raster.locator().ends_with("raster.zarr"));
    }
}
