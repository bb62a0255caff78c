//! Zarr V3 raster reader.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use raster_common::{BoundingBox, CrsCode};

use super::{PixelWindow, RasterInfo, RasterSource};
use crate::error::{Result, TileError};

/// A 2-D `float32` Zarr array with georeferencing attributes.
///
/// Required attribute `bbox` = `[min_x, min_y, max_x, max_y]` in native
/// units; optional `crs` (string or EPSG number, default 4326) and `nodata`. Pixels equal to
/// the array fill value or to `nodata` are read as NaN.
pub struct ZarrRaster<S: ReadableStorageTraits + Send + Sync + ?Sized + 'static> {
    array: Array<S>,
    name: String,
    info: RasterInfo,
    fill_value: f32,
}

impl ZarrRaster<FilesystemStore> {
    /// Open the array stored at the root of a directory.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(TileError::open_failed(format!(
                "{} is not a Zarr directory",
                path.display()
            )));
        }

        let store = FilesystemStore::new(path)
            .map_err(|e| TileError::open_failed(format!("{}: {}", path.display(), e)))?;
        Self::open(Arc::new(store), &path.display().to_string())
    }
}

impl<S: ReadableStorageTraits + Send + Sync + ?Sized + 'static> ZarrRaster<S> {
    /// Open the root array of `storage`; `name` identifies it in errors.
    pub fn open(storage: Arc<S>, name: &str) -> Result<Self> {
        let array = Array::open(storage, "/")
            .map_err(|e| TileError::open_failed(format!("{}: {}", name, e)))?;

        let info = Self::extract_info(&array, name)?;

        let fill_value = array
            .fill_value()
            .as_ne_bytes()
            .try_into()
            .map(f32::from_ne_bytes)
            .unwrap_or(f32::NAN);

        debug!(
            raster = %name,
            width = info.width,
            height = info.height,
            crs = %info.crs,
            chunk_rows = info.chunk_shape.0,
            chunk_cols = info.chunk_shape.1,
            "Opened Zarr raster"
        );

        Ok(Self {
            array,
            name: name.to_string(),
            info,
            fill_value,
        })
    }

    fn extract_info(array: &Array<S>, name: &str) -> Result<RasterInfo> {
        let shape = array.shape();
        if shape.len() != 2 {
            return Err(TileError::invalid_raster(format!(
                "{}: expected a 2-D array, found {} dimensions",
                name,
                shape.len()
            )));
        }
        if !matches!(array.data_type(), DataType::Float32) {
            return Err(TileError::invalid_raster(format!(
                "{}: expected float32 data",
                name
            )));
        }

        let origin = vec![0u64; shape.len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, shape)
            .map_err(|e| TileError::invalid_raster(e.to_string()))?
            .ok_or_else(|| TileError::invalid_raster("missing chunk shape"))?;
        let chunk_shape = (chunk_shape[0].get() as usize, chunk_shape[1].get() as usize);

        let attrs = array.attributes();

        let bounds = attrs
            .get("bbox")
            .and_then(|v| v.as_array())
            .and_then(|arr| {
                if arr.len() == 4 {
                    Some(BoundingBox::new(
                        arr[0].as_f64()?,
                        arr[1].as_f64()?,
                        arr[2].as_f64()?,
                        arr[3].as_f64()?,
                    ))
                } else {
                    None
                }
            })
            .filter(BoundingBox::is_valid)
            .ok_or_else(|| {
                TileError::invalid_raster(format!("{}: missing or invalid 'bbox' attribute", name))
            })?;

        let crs = match attrs.get("crs") {
            Some(value) => CrsCode::from_json(value)
                .map_err(|e| TileError::invalid_raster(format!("{}: {}", name, e)))?,
            None => CrsCode::default(),
        };

        let nodata = attrs
            .get("nodata")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32);

        Ok(RasterInfo {
            width: shape[1] as usize,
            height: shape[0] as usize,
            bounds,
            crs,
            chunk_shape,
            nodata,
        })
    }

    fn is_masked(&self, value: f32) -> bool {
        value.is_nan() || value == self.fill_value || self.info.nodata == Some(value)
    }
}

impl<S: ReadableStorageTraits + Send + Sync + ?Sized + 'static> RasterSource for ZarrRaster<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, window: &PixelWindow) -> Result<Vec<f32>> {
        // Zarr uses [row, col] indexing
        let subset = ArraySubset::new_with_start_shape(
            vec![window.row as u64, window.col as u64],
            vec![window.height as u64, window.width as u64],
        )
        .map_err(|e| TileError::read_failed(e.to_string()))?;

        let mut data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| TileError::read_failed(format!("{}: {}", self.name, e)))?;

        for value in data.iter_mut() {
            if self.is_masked(*value) {
                *value = f32::NAN;
            }
        }
        Ok(data)
    }
}
