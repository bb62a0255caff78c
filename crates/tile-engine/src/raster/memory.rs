//! Raster held in memory.

use raster_common::{BoundingBox, CrsCode};

use super::{PixelWindow, RasterInfo, RasterSource};
use crate::error::{Result, TileError};

/// A raster backed by a row-major `Vec<f32>`.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    name: String,
    info: RasterInfo,
    data: Vec<f32>,
}

impl InMemoryRaster {
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        bounds: BoundingBox,
        crs: CrsCode,
    ) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(TileError::invalid_raster(format!(
                "{} values do not fill a {}x{} raster",
                data.len(),
                width,
                height
            )));
        }
        if !bounds.is_valid() {
            return Err(TileError::invalid_raster(format!("invalid bounds {:?}", bounds)));
        }

        Ok(Self {
            name: "memory".to_string(),
            info: RasterInfo {
                width,
                height,
                bounds,
                crs,
                chunk_shape: (height, width),
                nodata: None,
            },
            data,
        })
    }

    /// Split statistics work into chunks of `(rows, cols)`.
    pub fn with_chunk_shape(mut self, rows: usize, cols: usize) -> Self {
        self.info.chunk_shape = (rows.max(1), cols.max(1));
        self
    }

    /// Treat `value` as nodata.
    pub fn with_nodata(mut self, value: f32) -> Self {
        for v in self.data.iter_mut() {
            if *v == value {
                *v = f32::NAN;
            }
        }
        self.info.nodata = Some(value);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl RasterSource for InMemoryRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, window: &PixelWindow) -> Result<Vec<f32>> {
        if window.row + window.height > self.info.height || window.col + window.width > self.info.width
        {
            return Err(TileError::read_failed(format!(
                "window {:?} exceeds {}x{} raster",
                window, self.info.width, self.info.height
            )));
        }

        let mut out = Vec::with_capacity(window.len());
        for row in window.row..window.row + window.height {
            let start = row * self.info.width + window.col;
            out.extend_from_slice(&self.data[start..start + window.width]);
        }
        Ok(out)
    }
}
