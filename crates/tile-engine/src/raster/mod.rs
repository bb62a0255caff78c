//! Raw raster access.

mod memory;
mod zarr;

pub use memory::InMemoryRaster;
pub use zarr::ZarrRaster;

use raster_common::{BoundingBox, CrsCode};

use crate::error::Result;

/// Georeferencing and layout of a single-band raster.
///
/// `bounds` are the outer pixel edges in native CRS units; row 0 is the
/// northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub bounds: BoundingBox,
    pub crs: CrsCode,
    /// Storage chunk shape `(rows, cols)`.
    pub chunk_shape: (usize, usize),
    /// Explicit nodata value, if the raster declares one.
    pub nodata: Option<f32>,
}

impl RasterInfo {
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Pixel size `(x, y)` in native units.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.width as f64,
            self.bounds.height() / self.height as f64,
        )
    }

    /// Native coordinate to fractional pixel coordinate `(col, row)`, with
    /// pixel centres at integer positions.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (res_x, res_y) = self.resolution();
        (
            (x - self.bounds.min_x) / res_x - 0.5,
            (self.bounds.max_y - y) / res_y - 0.5,
        )
    }

    /// Native coordinate of a pixel corner: `(col, row)` counts pixel edges
    /// from the north-west corner.
    pub fn pixel_corner(&self, col: f64, row: f64) -> (f64, f64) {
        let (res_x, res_y) = self.resolution();
        (
            self.bounds.min_x + col * res_x,
            self.bounds.max_y - row * res_y,
        )
    }

    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.height, self.width)
    }

    /// Storage chunks in row-major order, clipped to the raster edges.
    pub fn chunk_windows(&self) -> Vec<PixelWindow> {
        let (chunk_rows, chunk_cols) = self.chunk_shape;
        let chunk_rows = chunk_rows.max(1);
        let chunk_cols = chunk_cols.max(1);

        let mut windows = Vec::new();
        for row in (0..self.height).step_by(chunk_rows) {
            for col in (0..self.width).step_by(chunk_cols) {
                windows.push(PixelWindow::new(
                    row,
                    col,
                    chunk_rows.min(self.height - row),
                    chunk_cols.min(self.width - col),
                ));
            }
        }
        windows
    }

    /// Smallest pixel window covering a native-CRS box, grown by `margin`
    /// pixels on every side and clipped to the raster.
    pub fn window_for_bounds(&self, bounds: &BoundingBox, margin: usize) -> Option<PixelWindow> {
        let clipped = self.bounds.intersection(bounds)?;
        let (res_x, res_y) = self.resolution();

        let col_start = ((clipped.min_x - self.bounds.min_x) / res_x).floor().max(0.0) as usize;
        let col_end = ((clipped.max_x - self.bounds.min_x) / res_x)
            .ceil()
            .min(self.width as f64) as usize;
        let row_start = ((self.bounds.max_y - clipped.max_y) / res_y).floor().max(0.0) as usize;
        let row_end = ((self.bounds.max_y - clipped.min_y) / res_y)
            .ceil()
            .min(self.height as f64) as usize;

        let col_start = col_start.saturating_sub(margin);
        let row_start = row_start.saturating_sub(margin);
        let col_end = (col_end + margin).min(self.width);
        let row_end = (row_end + margin).min(self.height);

        if col_end <= col_start || row_end <= row_start {
            return None;
        }

        Some(PixelWindow::new(
            row_start,
            col_start,
            row_end - row_start,
            col_end - col_start,
        ))
    }
}

/// A rectangular block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
}

impl PixelWindow {
    pub fn new(row: usize, col: usize, height: usize, width: usize) -> Self {
        Self {
            row,
            col,
            height,
            width,
        }
    }

    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read access to a single-band raster.
///
/// Implementations report masked pixels (fill value, nodata) as NaN.
pub trait RasterSource: Send + Sync {
    /// Human-readable identity used in logs and errors.
    fn name(&self) -> &str;

    fn info(&self) -> &RasterInfo;

    /// Read a window in row-major order.
    fn read_window(&self, window: &PixelWindow) -> Result<Vec<f32>>;
}
