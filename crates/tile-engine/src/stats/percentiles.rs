//! Percentile estimation.
//!
//! Percentile `p` of `n` sorted samples sits at fractional rank
//! `p / 100 * (n - 1)` and is interpolated linearly between the two
//! closest ranks.

use raster_common::PERCENTILE_COUNT;

/// Fractional ranks of the 1st through 99th percentile.
fn percentile_ranks(count: u64) -> impl Iterator<Item = f64> {
    (1..=PERCENTILE_COUNT).map(move |p| p as f64 / 100.0 * (count.saturating_sub(1)) as f64)
}

fn interpolate_rank(rank: f64, value_at: impl Fn(u64) -> f64) -> f64 {
    let lo = rank.floor();
    let hi = rank.ceil();
    let low = value_at(lo as u64);
    if hi == lo {
        return low;
    }
    let high = value_at(hi as u64);
    low + (high - low) * (rank - lo)
}

/// Exact percentiles of sorted, non-empty samples.
pub fn exact_percentiles(sorted: &[f32]) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    percentile_ranks(sorted.len() as u64)
        .map(|rank| interpolate_rank(rank, |i| sorted[i as usize] as f64))
        .collect()
}

/// Fixed-width histogram between a known minimum and maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f64,
    max: f64,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(min: f64, max: f64, bins: usize) -> Self {
        Self {
            min,
            max,
            counts: vec![0; bins.max(1)],
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    fn bin_of(&self, value: f64) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        let bin = ((value - self.min) / span * self.counts.len() as f64).floor();
        (bin.max(0.0) as usize).min(self.counts.len() - 1)
    }

    pub fn push(&mut self, value: f64) {
        let bin = self.bin_of(value);
        self.counts[bin] += 1;
    }

    pub fn merge(mut self, other: Histogram) -> Histogram {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Estimated percentiles. Each estimate is within one bin width of the
    /// exact value.
    pub fn percentiles(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        if self.max <= self.min {
            return vec![self.min; PERCENTILE_COUNT];
        }

        let cumulative: Vec<u64> = self
            .counts
            .iter()
            .scan(0u64, |acc, c| {
                *acc += c;
                Some(*acc)
            })
            .collect();
        let width = self.bin_width();

        // Value of the sample with 0-based rank `rank`, assuming samples
        // spread evenly through their bin.
        let value_at = |rank: u64| {
            let bin = cumulative.partition_point(|&c| c <= rank);
            let before = if bin == 0 { 0 } else { cumulative[bin - 1] };
            let in_bin = self.counts[bin].max(1);
            let fraction = ((rank - before) as f64 + 0.5) / in_bin as f64;
            (self.min + (bin as f64 + fraction.clamp(0.0, 1.0)) * width).clamp(self.min, self.max)
        };

        percentile_ranks(total)
            .map(|rank| interpolate_rank(rank, value_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_percentiles_linear() {
        let sorted: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        let p = exact_percentiles(&sorted);
        assert_eq!(p.len(), 99);
        assert_eq!(p[0], 1.0);
        assert_eq!(p[49], 50.0);
        assert_eq!(p[98], 99.0);

        let sorted = [0.0f32, 10.0];
        let p = exact_percentiles(&sorted);
        assert!((p[24] - 2.5).abs() < 1e-9);
        assert!((p[98] - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(exact_percentiles(&[4.0]), vec![4.0; 99]);

        let mut h = Histogram::new(4.0, 4.0, 16);
        h.push(4.0);
        assert_eq!(h.percentiles(), vec![4.0; 99]);
    }

    #[test]
    fn test_histogram_within_one_bin() {
        let mut values: Vec<f32> = (0..5000)
            .map(|i| (((i * 7919) % 5003) as f32).sqrt() * 3.0 - 20.0)
            .collect();
        values.sort_by(f32::total_cmp);
        let min = values[0] as f64;
        let max = values[values.len() - 1] as f64;

        let mut h = Histogram::new(min, max, 1024);
        for v in &values {
            h.push(*v as f64);
        }
        let tolerance = h.bin_width() * 1.0001;

        let exact = exact_percentiles(&values);
        let estimated = h.percentiles();
        for (e, a) in exact.iter().zip(&estimated) {
            assert!((e - a).abs() <= tolerance, "exact {} estimated {}", e, a);
        }
        assert!(estimated.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_histogram_with_gap() {
        // Two clusters: interpolating across the gap must follow the exact rule
        let mut h = Histogram::new(0.0, 100.0, 100);
        let mut values = Vec::new();
        for _ in 0..50 {
            h.push(0.0);
            values.push(0.0f32);
        }
        for _ in 0..50 {
            h.push(100.0);
            values.push(100.0f32);
        }
        let exact = exact_percentiles(&values);
        let estimated = h.percentiles();
        for (e, a) in exact.iter().zip(&estimated) {
            assert!((e - a).abs() <= 1.0001, "exact {} estimated {}", e, a);
        }
    }
}
