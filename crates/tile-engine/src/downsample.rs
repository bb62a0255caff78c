//! Nearest-neighbour decimation of large rasters.
//!
//! Used to bound the cost of metadata computation: the raster is sampled on
//! a coarser grid that fits a maximum shape while keeping its aspect ratio.

use rayon::prelude::*;

use crate::error::Result;
use crate::raster::{PixelWindow, RasterSource};

/// Output shape `(rows, cols)` of decimating a `height x width` raster to
/// fit `max_shape`, keeping the aspect ratio. Rasters that already fit keep
/// their shape.
pub fn decimated_shape(height: usize, width: usize, max_shape: (usize, usize)) -> (usize, usize) {
    let (max_rows, max_cols) = (max_shape.0.max(1), max_shape.1.max(1));
    if height <= max_rows && width <= max_cols {
        return (height, width);
    }

    let factor = (height as f64 / max_rows as f64).max(width as f64 / max_cols as f64);
    let rows = ((height as f64 / factor).ceil() as usize).clamp(1, max_rows);
    let cols = ((width as f64 / factor).ceil() as usize).clamp(1, max_cols);
    (rows, cols)
}

/// Source index sampled by each of `out` cells spread over `len` pixels.
fn sample_indices(len: usize, out: usize) -> Vec<usize> {
    (0..out)
        .map(|i| (((i as f64 + 0.5) * len as f64 / out as f64).floor() as usize).min(len - 1))
        .collect()
}

/// Decimate a raster to fit `max_shape`.
///
/// Reads one storage chunk at a time and keeps only the sampled pixels, so
/// memory use is bounded by the output size plus one chunk per worker.
/// Returns `(data, rows, cols)`.
pub fn decimate_nearest(
    source: &dyn RasterSource,
    max_shape: (usize, usize),
) -> Result<(Vec<f32>, usize, usize)> {
    let info = source.info();
    let (rows, cols) = decimated_shape(info.height, info.width, max_shape);
    let row_samples = sample_indices(info.height, rows);
    let col_samples = sample_indices(info.width, cols);

    let picks: Vec<Vec<(usize, f32)>> = info
        .chunk_windows()
        .par_iter()
        .map(|window| pick_samples(source, window, &row_samples, &col_samples))
        .collect::<Result<_>>()?;

    let mut output = vec![f32::NAN; rows * cols];
    for (idx, value) in picks.into_iter().flatten() {
        output[idx] = value;
    }
    Ok((output, rows, cols))
}

fn pick_samples(
    source: &dyn RasterSource,
    window: &PixelWindow,
    row_samples: &[usize],
    col_samples: &[usize],
) -> Result<Vec<(usize, f32)>> {
    let in_window = |samples: &[usize], start: usize, len: usize| -> Vec<(usize, usize)> {
        samples
            .iter()
            .enumerate()
            .filter(|(_, &src)| src >= start && src < start + len)
            .map(|(out, &src)| (out, src - start))
            .collect()
    };

    let rows = in_window(row_samples, window.row, window.height);
    let cols = in_window(col_samples, window.col, window.width);
    if rows.is_empty() || cols.is_empty() {
        return Ok(Vec::new());
    }

    let data = source.read_window(window)?;
    let out_cols = col_samples.len();

    let mut picked = Vec::with_capacity(rows.len() * cols.len());
    for &(out_row, local_row) in &rows {
        for &(out_col, local_col) in &cols {
            picked.push((
                out_row * out_cols + out_col,
                data[local_row * window.width + local_col],
            ));
        }
    }
    Ok(picked)
}
