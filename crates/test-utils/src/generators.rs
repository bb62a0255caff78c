//! Synthetic `float32` grids, row-major with row 0 at the top.

/// Grid whose values encode their position: `col * 1000 + row`.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid[1], 1000.0); // row 0, col 1
/// assert_eq!(grid[10], 1.0); // row 1, col 0
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| (col * 1000 + row) as f32))
        .collect()
}

/// Reproducible irregular values in `[0, 1000)` with two decimals, so
/// both ties and gaps occur in the value distribution.
pub fn create_noise_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    (0..height)
        .flat_map(|row| {
            (0..width).map(move |col| {
                let cell = ((row as u64) << 32) | col as u64;
                (mix(cell ^ u64::from(seed).rotate_left(17)) % 100_000) as f32 / 100.0
            })
        })
        .collect()
}

/// splitmix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replace every cell strictly above the top-left to bottom-right diagonal
/// (`col * height > row * width`) with `fill`.
///
/// Gives a raster whose valid pixels form a triangle, for coverage and
/// convex hull tests.
pub fn mask_upper_triangle(data: &mut [f32], width: usize, height: usize, fill: f32) {
    for (idx, value) in data.iter_mut().enumerate().take(width * height) {
        let (row, col) = (idx / width, idx % width);
        if col * height > row * width {
            *value = fill;
        }
    }
}
