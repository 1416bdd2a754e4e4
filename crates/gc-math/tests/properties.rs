//! Property-based tests for gc-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use gc_math::{
    interpolate_clamped, li_ma_significance, spectral_weighted_mean_log10, KernelSmoother,
    SignificanceEstimator,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-9;

// ============================================================================
// Significance properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Scaling every count by k scales Li & Ma significance by sqrt(k).
    #[test]
    fn li_ma_homogeneous(n_on in 1.0..1.0e4f64, n_off in 1.0..1.0e4f64, alpha in 0.05..1.0f64, k in 1.0..50.0f64) {
        let base = li_ma_significance(n_on, n_off, alpha);
        let scaled = li_ma_significance(k * n_on, k * n_off, alpha);
        prop_assert!((scaled - k.sqrt() * base).abs() <= TOL * scaled.abs().max(1.0),
            "S(k*x)={} != sqrt(k)*S(x)={}", scaled, k.sqrt() * base);
    }

    /// Adding on-region events never lowers the significance.
    #[test]
    fn li_ma_monotone_in_on_counts(n_on in 0.0..1.0e4f64, extra in 0.0..1.0e3f64, n_off in 1.0..1.0e4f64, alpha in 0.05..1.0f64) {
        let lower = li_ma_significance(n_on, n_off, alpha);
        let higher = li_ma_significance(n_on + extra, n_off, alpha);
        prop_assert!(higher >= lower - TOL, "S({})={} > S({})={}", n_on, lower, n_on + extra, higher);
    }

    /// Every estimator agrees on the sign of the excess.
    #[test]
    fn estimators_share_sign(n_on in 1.0..1.0e4f64, n_off in 1.0..1.0e4f64, alpha in 0.05..1.0f64) {
        let excess = n_on - alpha * n_off;
        prop_assume!(excess.abs() > 1e-6);
        for estimator in [SignificanceEstimator::LiMa17, SignificanceEstimator::LiMa5, SignificanceEstimator::Simple] {
            let s = estimator.evaluate(n_on, n_off, alpha);
            prop_assert!(s.signum() == excess.signum(), "{} gave {} for excess {}", estimator, s, excess);
        }
    }
}

// ============================================================================
// Kernel smoothing properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Smoothed values stay within the range of the input ordinates.
    #[test]
    fn smoothing_is_bounded(ys in prop::collection::vec(-10.0..10.0f64, 2..40), bandwidth in 0.05..2.0f64) {
        let points: Vec<(f64, f64)> = ys.iter().enumerate().map(|(i, y)| (i as f64 * 0.1, *y)).collect();
        let lo = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let smoother = KernelSmoother::new(bandwidth).unwrap();
        for (_, y) in smoother.resample(&points, 64) {
            prop_assert!(y >= lo - TOL && y <= hi + TOL, "{} outside [{}, {}]", y, lo, hi);
        }
    }

    /// Pointwise-larger inputs give pointwise-larger smoothed curves.
    #[test]
    fn smoothing_preserves_order(ys in prop::collection::vec(0.0..10.0f64, 2..30), bump in prop::collection::vec(0.0..5.0f64, 30)) {
        let points: Vec<(f64, f64)> = ys.iter().enumerate().map(|(i, y)| (i as f64 * 0.1, *y)).collect();
        let raised: Vec<(f64, f64)> = points.iter().zip(bump.iter()).map(|((x, y), b)| (*x, y + b)).collect();
        let smoother = KernelSmoother::new(0.4).unwrap();
        let a = smoother.resample(&points, 32);
        let b = smoother.resample(&raised, 32);
        prop_assert_eq!(a.len(), b.len());
        for ((_, ya), (_, yb)) in a.iter().zip(b.iter()) {
            prop_assert!(yb >= &(ya - TOL));
        }
    }
}

// ============================================================================
// Interpolation / spectrum properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Interpolated values lie between the bracketing samples.
    #[test]
    fn interpolation_between_samples(y0 in -5.0..5.0f64, y1 in -5.0..5.0f64, t in 0.0..1.0f64) {
        let pts = [(0.0, y0), (1.0, y1)];
        let v = interpolate_clamped(&pts, t).unwrap();
        prop_assert!(v >= y0.min(y1) - TOL && v <= y0.max(y1) + TOL);
    }

    /// The spectral-weighted mean always falls inside its bin.
    #[test]
    fn spectral_mean_inside_bin(emin in -2.0..2.0f64, width in 0.01..1.0f64, index in 0.5..5.0f64) {
        let m = spectral_weighted_mean_log10(emin, emin + width, index).unwrap();
        prop_assert!(m >= emin - TOL && m <= emin + width + TOL, "{} outside [{}, {}]", m, emin, emin + width);
    }
}
