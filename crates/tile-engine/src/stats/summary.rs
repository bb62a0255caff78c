//! Mergeable per-chunk summaries.

use crate::raster::PixelWindow;

/// Count, range and running moments of a set of samples (Welford).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean.
    pub m2: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Moments {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Moments {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Combine two disjoint sample sets (Chan et al.).
    pub fn merge(&self, other: &Moments) -> Moments {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * self.count as f64 * other.count as f64 / count as f64;

        Moments {
            count,
            mean,
            m2,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Leftmost and rightmost valid column of every raster row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowExtents {
    rows: Vec<Option<(usize, usize)>>,
}

impl RowExtents {
    pub fn new(height: usize) -> Self {
        Self {
            rows: vec![None; height],
        }
    }

    /// Record valid pixels from `first` to `last` (inclusive) in `row`.
    pub fn include(&mut self, row: usize, first: usize, last: usize) {
        let slot = &mut self.rows[row];
        *slot = Some(match *slot {
            Some((lo, hi)) => (lo.min(first), hi.max(last)),
            None => (first, last),
        });
    }

    /// `(row, first_col, last_col)` for rows holding valid data.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(row, span)| span.map(|(lo, hi)| (row, lo, hi)))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Option::is_none)
    }
}

/// Statistics of one window: moments plus per-row valid spans.
#[derive(Debug, Clone)]
pub struct ChunkSummary {
    pub window: PixelWindow,
    pub moments: Moments,
    /// Per window row, first and last valid raster column.
    pub spans: Vec<Option<(usize, usize)>>,
}

impl ChunkSummary {
    /// Summarize the row-major samples of `window`. NaN is invalid.
    pub fn scan(window: PixelWindow, data: &[f32]) -> Self {
        let mut moments = Moments::default();
        let mut spans = vec![None; window.height];

        for (local_row, row) in data.chunks(window.width.max(1)).enumerate() {
            let mut first = None;
            let mut last = 0;
            for (local_col, value) in row.iter().enumerate() {
                if value.is_nan() {
                    continue;
                }
                moments.push(*value as f64);
                first.get_or_insert(local_col);
                last = local_col;
            }
            if let (Some(first), Some(span)) = (first, spans.get_mut(local_row)) {
                *span = Some((window.col + first, window.col + last));
            }
        }

        Self {
            window,
            moments,
            spans,
        }
    }

    /// Fold this chunk's spans into raster-wide extents.
    pub fn record_extents(&self, extents: &mut RowExtents) {
        for (local_row, span) in self.spans.iter().enumerate() {
            if let Some((first, last)) = span {
                extents.include(self.window.row + local_row, *first, *last);
            }
        }
    }
}
