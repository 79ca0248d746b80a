//! Conditional density of contrasts given background luminance.
//!
//! The log-luminance image is split into band-pass layers with an à-trous
//! (holed) binomial pyramid. For every band and every pair of neighbors at
//! the band's scale, the contrast between the two band values is binned by
//! magnitude ([`CONTRAST_BIN_WIDTH`] steps up to [`MAX_CONTRAST`]) under the
//! luminance bucket of the local background, i.e. the next, coarser
//! low-pass level. Buckets are the points of a uniform log-luminance grid
//! that exactly spans the image range.
//!
//! Counts are accumulated per row in parallel and merged by integer
//! addition, so results are bit-identical regardless of thread count.

use std::ops::RangeInclusive;

use datmo_core::Progress;
use rayon::prelude::*;
use tracing::debug;

use crate::{TmoError, TmoResult};

/// Luminance floor before taking logarithms (cd/m^2 or relative units).
pub const MIN_LUMINANCE: f32 = 1e-5;
/// Target spacing of the luminance grid in log10 units.
pub const LUM_BIN_WIDTH: f32 = 0.1;
/// Width of a contrast magnitude bin in log10 units.
pub const CONTRAST_BIN_WIDTH: f32 = 0.05;
/// Largest log10 contrast that is binned separately.
pub const MAX_CONTRAST: f32 = 2.0;
/// Upper bound on the number of contrast bands.
pub const MAX_BANDS: usize = 8;

/// Log-luminance ranges narrower than this are treated as constant.
const FLAT_RANGE: f32 = 1e-4;

/// Binomial kernel `[1 4 6 4 1] / 16`.
const KERNEL: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// log10 of a luminance sample, floored at [`MIN_LUMINANCE`].
#[inline]
pub fn log_luminance(y: f32) -> f32 {
    y.max(MIN_LUMINANCE).log10()
}

/// Number of bands analysed for a `width` x `height` image.
pub fn band_count(width: usize, height: usize) -> usize {
    let m = width.min(height).max(1);
    (m.ilog2() as usize).clamp(1, MAX_BANDS)
}

/// Number of contrast magnitude bins.
pub fn contrast_bin_count() -> usize {
    (MAX_CONTRAST / CONTRAST_BIN_WIDTH).round() as usize
}

/// One non-empty bin of the density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityEntry {
    /// Contrast band (0 = finest).
    pub band: usize,
    /// Luminance bucket (grid point) of the background.
    pub bucket: usize,
    /// Contrast magnitude bin, `1..=contrast_bins`.
    pub bin: usize,
    /// Share of all contrast samples that fell in this bin.
    pub weight: f64,
}

impl DensityEntry {
    /// Log10 contrast represented by the bin.
    pub fn contrast(&self) -> f32 {
        self.bin as f32 * CONTRAST_BIN_WIDTH
    }
}

/// Histogram of contrasts conditional on background luminance.
#[derive(Debug, Clone)]
pub struct ConditionalDensity {
    l_min: f32,
    l_max: f32,
    step: f32,
    x_count: usize,
    band_count: usize,
    contrast_bins: usize,
    /// `[band][bucket][bin]`, `bin` in `0..=contrast_bins` (0 unused).
    counts: Vec<u64>,
    total_samples: usize,
    contrast_samples: u64,
}

impl Default for ConditionalDensity {
    /// Density of an image with no pixels.
    fn default() -> Self {
        Self {
            l_min: 0.0,
            l_max: 0.0,
            step: 0.0,
            x_count: 1,
            band_count: 0,
            contrast_bins: contrast_bin_count(),
            counts: Vec::new(),
            total_samples: 0,
            contrast_samples: 0,
        }
    }
}

/// Grid layout shared by the band accumulators.
#[derive(Debug, Clone, Copy)]
struct Grid {
    l_min: f32,
    step: f32,
    x_count: usize,
    contrast_bins: usize,
}

impl Grid {
    fn stride(&self) -> usize {
        self.contrast_bins + 1
    }

    fn band_len(&self) -> usize {
        self.x_count * self.stride()
    }

    /// Bin index within one band for a contrast `g` around background `l_bg`.
    #[inline]
    fn bin(&self, l_bg: f32, g: f32) -> Option<usize> {
        let bin = (g / CONTRAST_BIN_WIDTH).round();
        if !(bin >= 1.0) {
            return None;
        }
        let bin = (bin as usize).min(self.contrast_bins);
        let bucket = ((l_bg - self.l_min) / self.step).round().max(0.0) as usize;
        let bucket = bucket.min(self.x_count - 1);
        Some(bucket * self.stride() + bin)
    }
}

impl ConditionalDensity {
    /// Builds the density for a luminance plane of `width` x `height`.
    ///
    /// Reports progress inside `window` once per band.
    ///
    /// # Errors
    ///
    /// - [`TmoError::InvalidImageData`] if a sample is negative or
    ///   non-finite, or the plane length does not match the dimensions
    /// - [`TmoError::DensityEstimationFailed`] if the image has no pixels
    pub fn estimate(
        lum: &[f32],
        width: usize,
        height: usize,
        progress: &mut Progress<'_>,
        window: RangeInclusive<u8>,
    ) -> TmoResult<Self> {
        let expected = width.checked_mul(height).ok_or_else(|| {
            TmoError::InvalidImageData(format!("{width}x{height} image is too large"))
        })?;
        if lum.len() != expected {
            return Err(TmoError::InvalidImageData(format!(
                "luminance plane has {} samples, expected {width}x{height}",
                lum.len()
            )));
        }
        if expected == 0 {
            return Err(TmoError::DensityEstimationFailed(
                "image contains no pixels".into(),
            ));
        }
        if let Some(i) = lum.par_iter().position_first(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(TmoError::InvalidImageData(format!(
                "luminance {} at pixel ({}, {}) is negative or not finite",
                lum[i],
                i % width,
                i / width
            )));
        }

        let log_lum: Vec<f32> = lum.par_iter().map(|&v| log_luminance(v)).collect();
        let (l_min, l_max) = log_lum
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );

        let range = l_max - l_min;
        let (x_count, step) = if range <= FLAT_RANGE {
            (1, 0.0)
        } else {
            let n = ((range / LUM_BIN_WIDTH).ceil() as usize + 1).max(2);
            (n, range / (n - 1) as f32)
        };
        let bands = band_count(width, height);
        let grid = Grid {
            l_min,
            step,
            x_count,
            contrast_bins: contrast_bin_count(),
        };

        debug!(
            l_min,
            l_max,
            x_count,
            step,
            bands,
            "building conditional contrast density"
        );

        let mut counts = vec![0u64; bands * grid.band_len()];
        let (start, end) = (*window.start(), *window.end());
        if x_count == 1 {
            // Constant image: no contrast to record
            progress.report(end);
        } else {
            let mut high = log_lum;
            for (band, dst) in counts.chunks_mut(grid.band_len()).enumerate() {
                let spacing = 1usize << band;
                let low = atrous_blur(&high, width, height, spacing);
                let hist = accumulate_band(&high, &low, width, height, spacing, &grid);
                for (d, s) in dst.iter_mut().zip(hist) {
                    *d += s;
                }
                high = low;
                progress.report_within(start, end, (band + 1) as f32 / bands as f32);
            }
        }

        let contrast_samples: u64 = counts.iter().sum();
        debug!(contrast_samples, "contrast density ready");

        Ok(Self {
            l_min,
            l_max,
            step,
            x_count,
            band_count: bands,
            contrast_bins: grid.contrast_bins,
            counts,
            total_samples: expected,
            contrast_samples,
        })
    }

    /// Lowest log10 luminance of the image.
    pub fn l_min(&self) -> f32 {
        self.l_min
    }

    /// Highest log10 luminance of the image.
    pub fn l_max(&self) -> f32 {
        self.l_max
    }

    /// Grid spacing in log10 units; 0 for a constant image.
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Number of grid points.
    pub fn x_count(&self) -> usize {
        self.x_count
    }

    /// Number of grid segments (`x_count - 1`).
    pub fn segment_count(&self) -> usize {
        self.x_count.saturating_sub(1)
    }

    /// Number of contrast bands.
    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Number of contrast magnitude bins.
    pub fn contrast_bins(&self) -> usize {
        self.contrast_bins
    }

    /// Grid point `k` in log10 luminance. The last point is exactly
    /// [`l_max`](Self::l_max).
    pub fn grid_point(&self, k: usize) -> f32 {
        if k + 1 >= self.x_count {
            if self.x_count <= 1 { self.l_min } else { self.l_max }
        } else {
            self.l_min + k as f32 * self.step
        }
    }

    /// All grid points.
    pub fn grid(&self) -> Vec<f32> {
        (0..self.x_count).map(|k| self.grid_point(k)).collect()
    }

    /// Number of pixels analysed.
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Number of non-zero contrasts recorded.
    pub fn contrast_samples(&self) -> u64 {
        self.contrast_samples
    }

    /// Returns true if no pixels were analysed.
    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    /// Raw count of one bin; 0 for out-of-range indices.
    pub fn count(&self, band: usize, bucket: usize, bin: usize) -> u64 {
        if band >= self.band_count || bucket >= self.x_count || bin == 0 || bin > self.contrast_bins {
            return 0;
        }
        let stride = self.contrast_bins + 1;
        self.counts[(band * self.x_count + bucket) * stride + bin]
    }

    /// Non-empty bins with their probability.
    pub fn entries(&self) -> impl Iterator<Item = DensityEntry> + '_ {
        let stride = self.contrast_bins + 1;
        let x_count = self.x_count.max(1);
        let total = self.contrast_samples.max(1) as f64;
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(move |(i, &c)| DensityEntry {
                band: i / (x_count * stride),
                bucket: (i / stride) % x_count,
                bin: i % stride,
                weight: c as f64 / total,
            })
    }
}

/// Index of tap `tap` (0..5) around `i` with holes of `spacing`, clamped to
/// the edge.
#[inline]
fn tap_index(i: usize, tap: usize, spacing: usize, len: usize) -> usize {
    let offset = (tap as isize - 2) * spacing as isize;
    (i as isize + offset).clamp(0, len as isize - 1) as usize
}

/// Separable binomial blur with taps `spacing` pixels apart.
fn atrous_blur(src: &[f32], width: usize, height: usize, spacing: usize) -> Vec<f32> {
    let mut tmp = vec![0.0f32; src.len()];
    tmp.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(dst, row)| {
            for (x, d) in dst.iter_mut().enumerate() {
                *d = KERNEL
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * row[tap_index(x, k, spacing, width)])
                    .sum();
            }
        });

    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, dst)| {
        for (k, w) in KERNEL.iter().enumerate() {
            let sy = tap_index(y, k, spacing, height);
            let row = &tmp[sy * width..(sy + 1) * width];
            for (d, s) in dst.iter_mut().zip(row) {
                *d += w * s;
            }
        }
    });
    out
}

/// Histogram of one band: contrasts between each pixel and its right and
/// bottom neighbors at distance `offset`.
fn accumulate_band(
    high: &[f32],
    low: &[f32],
    width: usize,
    height: usize,
    offset: usize,
    grid: &Grid,
) -> Vec<u64> {
    let len = grid.band_len();
    (0..height)
        .into_par_iter()
        .fold(
            || vec![0u64; len],
            |mut hist, y| {
                for x in 0..width {
                    let i = y * width + x;
                    let band_p = high[i] - low[i];
                    let mut record = |q: usize| {
                        let g = ((high[q] - low[q]) - band_p).abs();
                        if let Some(bin) = grid.bin(low[i], g) {
                            hist[bin] += 1;
                        }
                    };
                    if x + offset < width {
                        record(i + offset);
                    }
                    if y + offset < height {
                        record(i + offset * width);
                    }
                }
                hist
            },
        )
        .reduce(
            || vec![0u64; len],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use datmo_core::NoProgress;

    fn estimate(lum: &[f32], w: usize, h: usize) -> TmoResult<ConditionalDensity> {
        let mut sink = NoProgress;
        let mut progress = Progress::new(&mut sink);
        ConditionalDensity::estimate(lum, w, h, &mut progress, 0..=40)
    }

    fn checker(w: usize, h: usize, lo: f32, hi: f32) -> Vec<f32> {
        (0..w * h)
            .map(|i| if (i % w + i / w) % 2 == 0 { lo } else { hi })
            .collect()
    }

    #[test]
    fn test_band_count() {
        assert_eq!(band_count(1, 1), 1);
        assert_eq!(band_count(2, 2), 1);
        assert_eq!(band_count(64, 16), 4);
        assert_eq!(band_count(4096, 4096), MAX_BANDS);
    }

    #[test]
    fn test_grid_spans_range() {
        let lum = checker(8, 8, 0.01, 100.0);
        let d = estimate(&lum, 8, 8).unwrap();
        assert_relative_eq!(d.l_min(), -2.0, epsilon = 1e-5);
        assert_relative_eq!(d.l_max(), 2.0, epsilon = 1e-5);
        assert!((41..=42).contains(&d.x_count()));
        assert!(d.step() <= LUM_BIN_WIDTH + 1e-5);
        assert_eq!(d.grid_point(d.x_count() - 1), d.l_max());
        assert_eq!(d.grid_point(0), d.l_min());
        assert_eq!(d.contrast_bins(), 40);
        let grid = d.grid();
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let lum: Vec<f32> = (0..32 * 16).map(|i| 0.05 + (i % 32) as f32 * 3.0).collect();
        let d = estimate(&lum, 32, 16).unwrap();
        assert!(d.contrast_samples() > 0);
        let sum: f64 = d.entries().map(|e| e.weight).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        for e in d.entries() {
            assert!(e.bin >= 1 && e.bin <= d.contrast_bins());
            assert!(e.contrast() <= MAX_CONTRAST + 1e-6);
            assert!(e.bucket < d.x_count());
            assert!(e.band < d.band_count());
            assert_eq!(d.count(e.band, e.bucket, e.bin) as f64 / d.contrast_samples() as f64, e.weight);
        }
    }

    #[test]
    fn test_checker_contrast_bin() {
        // 2:1 checker: band-0 neighbors differ by log10(2) ~ 0.30, bin 6
        let d = estimate(&checker(16, 16, 1.0, 2.0), 16, 16).unwrap();
        let top = d
            .entries()
            .filter(|e| e.band == 0)
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .unwrap();
        assert_eq!(top.bin, 6);
        assert_relative_eq!(top.contrast(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_constant_image() {
        let d = estimate(&[3.0; 16], 4, 4).unwrap();
        assert_eq!(d.x_count(), 1);
        assert_eq!(d.segment_count(), 0);
        assert_eq!(d.contrast_samples(), 0);
        assert_eq!(d.total_samples(), 16);
        assert!(!d.is_empty());
        assert_eq!(d.grid(), vec![d.l_min()]);
    }

    #[test]
    fn test_two_by_two() {
        let d = estimate(&[1.0, 10.0, 10.0, 1.0], 2, 2).unwrap();
        assert_eq!(d.band_count(), 1);
        assert!(d.x_count() >= 11);
        assert!(d.contrast_samples() > 0);
    }

    #[test]
    fn test_rejects_bad_samples() {
        let err = estimate(&[1.0, -1.0, 1.0, 1.0], 2, 2).unwrap_err();
        assert!(matches!(err, TmoError::InvalidImageData(_)));
        let err = estimate(&[1.0, f32::NAN, 1.0, 1.0], 2, 2).unwrap_err();
        assert!(matches!(err, TmoError::InvalidImageData(_)));
        let err = estimate(&[1.0; 3], 2, 2).unwrap_err();
        assert!(matches!(err, TmoError::InvalidImageData(_)));
        let err = estimate(&[], 0, 4).unwrap_err();
        assert!(matches!(err, TmoError::DensityEstimationFailed(_)));
    }

    #[test]
    fn test_zero_luminance_is_floored() {
        let d = estimate(&[0.0, 1.0, 1.0, 0.0], 2, 2).unwrap();
        assert_relative_eq!(d.l_min(), MIN_LUMINANCE.log10());
    }

    #[test]
    fn test_same_counts_for_any_thread_count() {
        let lum: Vec<f32> = (0..64 * 48)
            .map(|i| ((i * 7919) % 1000) as f32 * 0.37 + 0.001)
            .collect();
        let in_pool = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| estimate(&lum, 64, 48).unwrap())
        };
        let single = in_pool(1);
        for threads in [2, 4, 7] {
            let multi = in_pool(threads);
            assert_eq!(single.counts, multi.counts, "{threads} threads");
            assert_eq!(single.l_min, multi.l_min);
            assert_eq!(single.l_max, multi.l_max);
            assert_eq!(single.contrast_samples, multi.contrast_samples);
        }
    }

    #[test]
    fn test_progress_within_window() {
        let mut seen = Vec::new();
        let mut sink = |p: u8| seen.push(p);
        let mut progress = Progress::new(&mut sink);
        let lum = checker(16, 16, 0.1, 10.0);
        ConditionalDensity::estimate(&lum, 16, 16, &mut progress, 10..=40).unwrap();
        assert_eq!(seen.last(), Some(&40));
        assert!(seen.iter().all(|p| (10..=40).contains(p)));
    }

    #[test]
    fn test_atrous_preserves_constant() {
        let src = vec![2.5f32; 7 * 5];
        let out = atrous_blur(&src, 7, 5, 4);
        for v in out {
            assert_relative_eq!(v, 2.5, epsilon = 1e-6);
        }
    }
}
