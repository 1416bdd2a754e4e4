//! Fixed-bandwidth Gaussian kernel regression (Nadaraya-Watson).
//!
//! The bandwidth follows the `ksmooth` "normal" kernel convention: the kernel
//! quartiles sit at +/- 0.25 * bandwidth, which makes the Gaussian standard
//! deviation `0.3706506 * bandwidth`. Samples further than four standard
//! deviations from the evaluation point carry no weight, so a point with no
//! neighbor inside that window has no smoothed value.

/// Ratio between Gaussian sigma and the kernel bandwidth.
pub const KERNEL_SIGMA_PER_BANDWIDTH: f64 = 0.370_650_6;

/// Kernel support in units of sigma.
const KERNEL_CUTOFF_SIGMAS: f64 = 4.0;

/// Smallest total weight still treated as "has neighbors".
const MIN_WEIGHT_SUM: f64 = 1e-300;

/// Gaussian kernel smoother with a fixed bandwidth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSmoother {
    sigma: f64,
}

impl KernelSmoother {
    /// Create a smoother; returns None for non-positive or non-finite bandwidths.
    pub fn new(bandwidth: f64) -> Option<Self> {
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return None;
        }
        Some(Self {
            sigma: bandwidth * KERNEL_SIGMA_PER_BANDWIDTH,
        })
    }

    /// Gaussian sigma implied by the bandwidth.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn weight(&self, distance: f64) -> f64 {
        let z = distance / self.sigma;
        if z.abs() > KERNEL_CUTOFF_SIGMAS {
            return 0.0;
        }
        (-0.5 * z * z).exp()
    }

    /// Smoothed value at `x0`, or None when no sample lies inside the kernel.
    ///
    /// `points` need not be sorted. Non-finite samples are skipped.
    pub fn value_at(&self, points: &[(f64, f64)], x0: f64) -> Option<f64> {
        if x0.is_nan() {
            return None;
        }
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for &(x, y) in points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let w = self.weight(x - x0);
            weight_sum += w;
            value_sum += w * y;
        }
        if weight_sum < MIN_WEIGHT_SUM {
            return None;
        }
        Some(value_sum / weight_sum)
    }

    /// Smooth onto `n_points` evenly spaced abscissae spanning the sample range.
    ///
    /// Grid points without kernel support are dropped. Returns an empty vector
    /// when there are no finite samples.
    pub fn resample(&self, points: &[(f64, f64)], n_points: usize) -> Vec<(f64, f64)> {
        let finite = || {
            points
                .iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|(x, _)| *x)
        };
        let lo = finite().fold(f64::INFINITY, f64::min);
        let hi = finite().fold(f64::NEG_INFINITY, f64::max);
        if !(lo.is_finite() && hi.is_finite()) {
            return Vec::new();
        }
        if n_points <= 1 || hi == lo {
            return self
                .value_at(points, lo)
                .map(|y| vec![(lo, y)])
                .unwrap_or_default();
        }

        let step = (hi - lo) / (n_points - 1) as f64;
        (0..n_points)
            .filter_map(|i| {
                // Pin the last grid point to `hi` against accumulated rounding.
                let x = if i == n_points - 1 {
                    hi
                } else {
                    lo + step * i as f64
                };
                self.value_at(points, x).map(|y| (x, y))
            })
            .collect()
    }
}

/// Product-kernel smoother over two coordinates with separate bandwidths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSmoother2d {
    x: KernelSmoother,
    y: KernelSmoother,
}

impl KernelSmoother2d {
    /// Create a 2D smoother; None if either bandwidth is invalid.
    pub fn new(bandwidth_x: f64, bandwidth_y: f64) -> Option<Self> {
        Some(Self {
            x: KernelSmoother::new(bandwidth_x)?,
            y: KernelSmoother::new(bandwidth_y)?,
        })
    }

    /// Smoothed value at `(x0, y0)` from `(x, y, value)` samples.
    pub fn value_at(&self, points: &[(f64, f64, f64)], x0: f64, y0: f64) -> Option<f64> {
        if x0.is_nan() || y0.is_nan() {
            return None;
        }
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for &(x, y, v) in points {
            if !(x.is_finite() && y.is_finite() && v.is_finite()) {
                continue;
            }
            let w = self.x.weight(x - x0) * self.y.weight(y - y0);
            weight_sum += w;
            value_sum += w * v;
        }
        if weight_sum < MIN_WEIGHT_SUM {
            return None;
        }
        Some(value_sum / weight_sum)
    }
}
