//! Convex hull of valid pixels.

use projection::Transformer;

use crate::raster::RasterInfo;

use super::summary::RowExtents;

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, without the
/// closing point and without collinear vertices.
pub fn convex_hull(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut lower: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Hull of the footprints of valid pixels, with vertices in the target CRS
/// of `transformer`.
///
/// Only the outer corners of each row's leftmost and rightmost valid pixel
/// can be hull vertices. Corners are transformed before the hull is taken:
/// a straight edge in the native CRS may curve in the target CRS, so the
/// reprojected native hull would cut through valid pixels. The supported
/// transforms are separable in x and y, so each pixel footprint stays an
/// axis-aligned rectangle and its corners enclose it.
pub fn valid_pixel_hull(
    grid: &RasterInfo,
    extents: &RowExtents,
    transformer: &Transformer,
) -> Vec<(f64, f64)> {
    let mut corners = Vec::new();
    for (row, first, last) in extents.iter() {
        let top = row as f64;
        let bottom = (row + 1) as f64;
        let left = first as f64;
        let right = (last + 1) as f64;
        for (col, row) in [(left, top), (left, bottom), (right, top), (right, bottom)] {
            let (x, y) = grid.pixel_corner(col, row);
            corners.push(transformer.transform(x, y));
        }
    }
    convex_hull(corners)
}
