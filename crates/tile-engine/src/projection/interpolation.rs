//! Interpolation methods for masked grids.
//!
//! Grids are row-major with NaN marking invalid samples. Coordinates are
//! fractional pixel positions with pixel centres at integers.

use crate::types::InterpolationMethod;

/// Index of the pixel containing fractional position `x` along an axis of
/// `len` pixels.
fn nearest_index(x: f64, len: usize) -> Option<usize> {
    if len == 0 || !(x >= -0.5 && x <= len as f64 - 0.5) {
        return None;
    }
    Some(((x + 0.5).floor() as usize).min(len - 1))
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the pixel containing the position, so output values
/// are always source values (or NaN).
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    match (nearest_index(x, width), nearest_index(y, height)) {
        (Some(col), Some(row)) => data[row * width + col],
        _ => f32::NAN,
    }
}

/// Bilinear interpolation over valid neighbours.
///
/// Invalid corners are dropped and the remaining weights renormalised. The
/// result is NaN whenever the nearest sample is invalid, so masks do not
/// grow into valid areas or shrink into invalid ones.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let nearest = nearest_interpolate(data, width, height, x, y);
    if nearest.is_nan() {
        return f32::NAN;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = [
        (x0, y0, (1.0 - xf) * (1.0 - yf)),
        (x1, y0, xf * (1.0 - yf)),
        (x0, y1, (1.0 - xf) * yf),
        (x1, y1, xf * yf),
    ];

    let mut sum = 0.0f64;
    let mut weight = 0.0f64;
    for (col, row, w) in corners {
        let v = data[row * width + col];
        if w > 0.0 && !v.is_nan() {
            sum += v as f64 * w;
            weight += w;
        }
    }

    if weight > 0.0 {
        (sum / weight) as f32
    } else {
        nearest
    }
}

/// Sample a grid with the given method.
pub fn interpolate(
    method: InterpolationMethod,
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
) -> f32 {
    match method {
        InterpolationMethod::Nearest => nearest_interpolate(data, width, height, x, y),
        InterpolationMethod::Bilinear => bilinear_interpolate(data, width, height, x, y),
    }
}
