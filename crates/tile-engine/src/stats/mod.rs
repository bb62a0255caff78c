//! Dataset metadata computation.
//!
//! Three passes share the same outputs:
//!
//! - **Exact**: the whole raster is read, percentiles come from the sorted
//!   samples.
//! - **Chunked**: storage chunks are streamed twice. The first pass merges
//!   per-chunk moments and valid-pixel extents, the second fills a histogram
//!   between the global minimum and maximum.
//! - **Downsampled**: nearest-neighbour decimation to a maximum shape, then
//!   the exact pass on the smaller grid.

pub mod hull;
pub mod percentiles;
pub mod summary;

use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use projection::{transform_bounds, Transformer, DEFAULT_DENSIFY_POINTS};
use raster_common::{CrsCode, DatasetMetadata, Polygon};

use crate::config::TileEngineConfig;
use crate::downsample::decimate_nearest;
use crate::error::{Result, TileError};
use crate::raster::{RasterInfo, RasterSource};
use crate::types::{MetadataOptions, StatsPolicy};

use hull::valid_pixel_hull;
use percentiles::{exact_percentiles, Histogram};
use summary::{ChunkSummary, Moments, RowExtents};

/// Everything gathered from the pixels before georeferencing.
struct PixelStats {
    moments: Moments,
    percentiles: Vec<f64>,
    extents: RowExtents,
    /// Grid the statistics were computed on.
    grid: RasterInfo,
}

/// Compute the metadata record of a raster.
///
/// `extra` is client metadata stored alongside the computed fields.
pub fn compute_metadata(
    source: &dyn RasterSource,
    options: &MetadataOptions,
    extra: Option<Map<String, Value>>,
    config: &TileEngineConfig,
) -> Result<DatasetMetadata> {
    let info = source.info();
    let policy = options.resolve(info, config)?;

    info!(
        raster = %source.name(),
        width = info.width,
        height = info.height,
        policy = ?policy,
        "Computing dataset metadata"
    );

    let stats = match policy {
        StatsPolicy::Exact => {
            let data = source.read_window(&info.full_window())?;
            exact_stats(info.clone(), data)
        }
        StatsPolicy::Chunked => chunked_stats(source, config.percentile_histogram_bins)?,
        StatsPolicy::Downsampled { max_shape } => {
            let (data, rows, cols) = decimate_nearest(source, max_shape)?;
            debug!(rows = rows, cols = cols, "Decimated raster for metadata");
            let grid = RasterInfo {
                width: cols,
                height: rows,
                chunk_shape: (rows, cols),
                ..info.clone()
            };
            exact_stats(grid, data)
        }
    };

    if stats.moments.count == 0 {
        return Err(TileError::NoValidData(source.name().to_string()));
    }

    let bounds = transform_bounds(
        &info.bounds,
        info.crs,
        CrsCode::Epsg4326,
        DEFAULT_DENSIFY_POINTS,
    );

    let to_lonlat = Transformer::new(info.crs, CrsCode::Epsg4326);
    let ring = valid_pixel_hull(&stats.grid, &stats.extents, &to_lonlat)
        .into_iter()
        .map(|(lon, lat)| [lon, lat])
        .collect();

    let valid_percentage =
        stats.moments.count as f64 / stats.grid.pixel_count().max(1) as f64 * 100.0;

    let metadata = DatasetMetadata {
        range: (stats.moments.min, stats.moments.max),
        bounds,
        convex_hull: Polygon::from_ring(ring),
        valid_percentage,
        percentiles: stats.percentiles,
        mean: stats.moments.mean,
        stdev: stats.moments.stdev(),
        metadata: extra.unwrap_or_default(),
    };

    debug!(
        raster = %source.name(),
        min = metadata.range.0,
        max = metadata.range.1,
        valid_percentage = metadata.valid_percentage,
        "Computed dataset metadata"
    );

    Ok(metadata)
}

fn exact_stats(grid: RasterInfo, data: Vec<f32>) -> PixelStats {
    let summary = ChunkSummary::scan(grid.full_window(), &data);
    let mut extents = RowExtents::new(grid.height);
    summary.record_extents(&mut extents);

    let mut valid: Vec<f32> = data.into_iter().filter(|v| !v.is_nan()).collect();
    valid.sort_unstable_by(f32::total_cmp);

    PixelStats {
        moments: summary.moments,
        percentiles: exact_percentiles(&valid),
        extents,
        grid,
    }
}

fn chunked_stats(source: &dyn RasterSource, bins: usize) -> Result<PixelStats> {
    let info = source.info();
    let windows = info.chunk_windows();

    let summaries: Vec<ChunkSummary> = windows
        .par_iter()
        .map(|window| {
            let data = source.read_window(window)?;
            Ok(ChunkSummary::scan(*window, &data))
        })
        .collect::<Result<_>>()?;

    let mut moments = Moments::default();
    let mut extents = RowExtents::new(info.height);
    for summary in &summaries {
        moments = moments.merge(&summary.moments);
        summary.record_extents(&mut extents);
    }

    debug!(
        chunks = windows.len(),
        valid = moments.count,
        "Finished first chunked pass"
    );

    let percentiles = if moments.count == 0 {
        Vec::new()
    } else {
        // Chunks without valid pixels are skipped on the second pass
        let (min, max) = (moments.min, moments.max);
        let histogram = summaries
            .par_iter()
            .filter(|summary| summary.moments.count > 0)
            .map(|summary| -> Result<Histogram> {
                let data = source.read_window(&summary.window)?;
                let mut histogram = Histogram::new(min, max, bins);
                for value in data.into_iter().filter(|v| !v.is_nan()) {
                    histogram.push(value as f64);
                }
                Ok(histogram)
            })
            .try_reduce(|| Histogram::new(min, max, bins), |a, b| Ok(a.merge(b)))?;
        histogram.percentiles()
    };

    Ok(PixelStats {
        moments,
        percentiles,
        extents,
        grid: info.clone(),
    })
}
