//! Power-law spectral weighting.

/// Mean energy of a power law `dN/dE ~ E^-index` between two log10 edges.
///
/// Returns the log10 of `int E * E^-index dE / int E^-index dE` over
/// `[10^emin_log10, 10^emax_log10]`. Returns None unless both edges are finite
/// and `emin_log10 < emax_log10`.
pub fn spectral_weighted_mean_log10(emin_log10: f64, emax_log10: f64, index: f64) -> Option<f64> {
    if !(emin_log10.is_finite() && emax_log10.is_finite() && index.is_finite()) {
        return None;
    }
    if emin_log10 >= emax_log10 {
        return None;
    }
    let a = 10f64.powf(emin_log10);
    let b = 10f64.powf(emax_log10);

    let numerator = power_integral(a, b, 1.0 - index);
    let denominator = power_integral(a, b, -index);
    if !(numerator > 0.0 && denominator > 0.0) {
        return None;
    }
    Some((numerator / denominator).log10())
}

/// Integral of `E^p` from a to b (a, b > 0).
fn power_integral(a: f64, b: f64, p: f64) -> f64 {
    let q = p + 1.0;
    if q.abs() < 1e-12 {
        return (b / a).ln();
    }
    (b.powf(q) - a.powf(q)) / q
}
