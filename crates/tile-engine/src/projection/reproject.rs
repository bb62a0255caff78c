//! Mapping output tile pixels onto source raster pixels.

use rayon::prelude::*;

use projection::{transform_bounds, Transformer, DEFAULT_DENSIFY_POINTS};
use raster_common::{BoundingBox, CrsCode};

use super::interpolate;
use crate::error::{Result, TileError};
use crate::raster::{PixelWindow, RasterInfo, RasterSource};
use crate::types::{InterpolationMethod, RasterTile};

/// Everything needed to render one tile, decided before reading pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePlan {
    pub rows: usize,
    pub cols: usize,
    /// Extent of the output grid in the output CRS.
    pub grid_bounds: BoundingBox,
    /// Part of the output grid that may hold valid pixels.
    pub clip: BoundingBox,
    /// Output CRS to raster CRS.
    pub transformer: Transformer,
    /// Source pixels to read.
    pub window: PixelWindow,
    pub method: InterpolationMethod,
}

/// Decide the output grid and source window for a tile.
///
/// With `tile_bounds` (Web Mercator) the output grid covers those bounds;
/// without, it covers the whole raster in its native CRS. Fails with
/// `TileOutOfBounds` when the bounds miss the raster entirely.
pub fn plan_tile(
    info: &RasterInfo,
    tile_bounds: Option<&BoundingBox>,
    shape: (usize, usize),
    method: InterpolationMethod,
) -> Result<TilePlan> {
    let (rows, cols) = shape;

    let Some(bounds) = tile_bounds else {
        return Ok(TilePlan {
            rows,
            cols,
            grid_bounds: info.bounds,
            clip: info.bounds,
            transformer: Transformer::new(info.crs, info.crs),
            window: info.full_window(),
            method,
        });
    };

    let extent = transform_bounds(
        &info.bounds,
        info.crs,
        CrsCode::Epsg3857,
        DEFAULT_DENSIFY_POINTS,
    );
    let out_of_bounds = || TileError::out_of_bounds(format!("{:?}", bounds), format!("{:?}", extent));

    if !bounds.is_valid() {
        return Err(out_of_bounds());
    }
    let clip = extent.intersection(bounds).ok_or_else(out_of_bounds)?;

    let footprint = transform_bounds(&clip, CrsCode::Epsg3857, info.crs, DEFAULT_DENSIFY_POINTS);
    let window = info
        .window_for_bounds(&footprint, 1)
        .ok_or_else(out_of_bounds)?;

    Ok(TilePlan {
        rows,
        cols,
        grid_bounds: *bounds,
        clip,
        transformer: Transformer::new(CrsCode::Epsg3857, info.crs),
        window,
        method,
    })
}

/// Read the planned window and resample it onto the output grid.
///
/// Output pixel centres outside the clip area or the raster extent stay
/// masked.
pub fn render_tile(source: &dyn RasterSource, plan: &TilePlan) -> Result<RasterTile> {
    let info = source.info();
    let window = plan.window;
    let data = source.read_window(&window)?;
    if data.len() != window.len() {
        return Err(TileError::read_failed(format!(
            "{}: expected {} samples, got {}",
            source.name(),
            window.len(),
            data.len()
        )));
    }

    let grid = &plan.grid_bounds;
    let step_x = grid.width() / plan.cols as f64;
    let step_y = grid.height() / plan.rows as f64;

    let values: Vec<f32> = (0..plan.rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            let y = grid.max_y - (row as f64 + 0.5) * step_y;
            let data = &data;
            (0..plan.cols).map(move |col| {
                let x = grid.min_x + (col as f64 + 0.5) * step_x;
                if !plan.clip.contains_point(x, y) {
                    return f32::NAN;
                }

                let (nx, ny) = plan.transformer.transform(x, y);
                if !info.bounds.contains_point(nx, ny) {
                    return f32::NAN;
                }

                let (px, py) = info.geo_to_pixel(nx, ny);
                interpolate(
                    plan.method,
                    data,
                    window.width,
                    window.height,
                    px - window.col as f64,
                    py - window.row as f64,
                )
            })
        })
        .collect();

    Ok(RasterTile::from_values(values, plan.rows, plan.cols))
}
