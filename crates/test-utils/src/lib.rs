//! Fixtures and helpers shared by the rastercat test suites.
//!
//! - [`generators`]: synthetic `float32` grids with known values
//! - [`fixtures`]: Zarr rasters written to temporary directories
//! - tolerance assertions for statistics and coordinates
//!
//! ```ignore
//! use test_utils::{create_test_grid, TempRaster, ZarrRasterFixture};
//!
//! let raster = TempRaster::write(&ZarrRasterFixture::new(create_test_grid(8, 4), 8, 4, bbox))?;
//! let tile = engine.get_raster_tile(&raster.locator(), &request)?;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert that two numbers differ by at most `tolerance`.
///
/// Operands are widened to `f64`, so `f32` samples can be compared with
/// `f64` statistics directly.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let actual = $actual as f64;
        let expected = $expected as f64;
        let tolerance = $tolerance as f64;
        assert!(
            (actual - expected).abs() <= tolerance,
            "assertion failed: {} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            tolerance,
            expected
        );
    }};
}

/// Assert that a `BoundingBox` matches `(min_x, min_y, max_x, max_y)`
/// edge by edge within `tolerance`.
#[macro_export]
macro_rules! assert_bounds_approx_eq {
    ($bounds:expr, ($min_x:expr, $min_y:expr, $max_x:expr, $max_y:expr), $tolerance:expr) => {{
        let bounds = &$bounds;
        $crate::assert_approx_eq!(bounds.min_x, $min_x, $tolerance);
        $crate::assert_approx_eq!(bounds.min_y, $min_y, $tolerance);
        $crate::assert_approx_eq!(bounds.max_x, $max_x, $tolerance);
        $crate::assert_approx_eq!(bounds.max_y, $max_y, $tolerance);
    }};
}

#[cfg(test)]
mod tests {
    use raster_common::BoundingBox;

    #[test]
    fn test_approx_eq_accepts_mixed_precision() {
        assert_approx_eq!(0.1_f32, 0.1_f64, 1e-7);
        assert_approx_eq!(-3.0, -3.0000004, 1e-6);
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_approx_eq_rejects_distant_values() {
        assert_approx_eq!(2.5, 2.0, 0.1);
    }

    #[test]
    fn test_bounds_approx_eq() {
        let bounds = BoundingBox::new(-10.0000001, 30.0, 10.0, 50.0000001);
        assert_bounds_approx_eq!(bounds, (-10.0, 30.0, 10.0, 50.0), 1e-6);
    }
}
