//! Detection significance for on/off counting experiments.
//!
//! All estimators take the raw on-region count, the raw off-region count and
//! the on/off exposure ratio `alpha`, so the expected background in the on
//! region is `alpha * n_off`.

use serde::{Deserialize, Serialize};

/// Significance estimator for an on/off counting experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceEstimator {
    /// Li & Ma (1983), eq. 17: likelihood-ratio significance.
    #[default]
    LiMa17,
    /// Li & Ma (1983), eq. 5: excess over its propagated error.
    LiMa5,
    /// Excess over the square root of the expected background.
    Simple,
}

impl SignificanceEstimator {
    /// Evaluate the estimator for the given counts.
    pub fn evaluate(self, n_on: f64, n_off: f64, alpha: f64) -> f64 {
        match self {
            SignificanceEstimator::LiMa17 => li_ma_significance(n_on, n_off, alpha),
            SignificanceEstimator::LiMa5 => li_ma_eq5_significance(n_on, n_off, alpha),
            SignificanceEstimator::Simple => simple_significance(n_on, n_off, alpha),
        }
    }
}

impl std::fmt::Display for SignificanceEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignificanceEstimator::LiMa17 => write!(f, "li_ma_17"),
            SignificanceEstimator::LiMa5 => write!(f, "li_ma_5"),
            SignificanceEstimator::Simple => write!(f, "simple"),
        }
    }
}

fn valid_counts(n_on: f64, n_off: f64, alpha: f64) -> bool {
    !(n_on.is_nan() || n_off.is_nan() || alpha.is_nan())
        && n_on >= 0.0
        && n_off >= 0.0
        && alpha > 0.0
        && n_on.is_finite()
        && n_off.is_finite()
        && alpha.is_finite()
}

/// Li & Ma (1983) eq. 17 significance, signed by the sign of the excess.
///
/// Returns NaN for negative counts or non-positive alpha and 0.0 when both
/// counts are zero.
pub fn li_ma_significance(n_on: f64, n_off: f64, alpha: f64) -> f64 {
    if !valid_counts(n_on, n_off, alpha) {
        return f64::NAN;
    }
    let total = n_on + n_off;
    if total <= 0.0 {
        return 0.0;
    }

    // x ln(x) -> 0 as x -> 0, so empty regions contribute nothing.
    let on_term = if n_on > 0.0 {
        n_on * (((1.0 + alpha) / alpha) * (n_on / total)).ln()
    } else {
        0.0
    };
    let off_term = if n_off > 0.0 {
        n_off * ((1.0 + alpha) * (n_off / total)).ln()
    } else {
        0.0
    };

    let s = (2.0 * (on_term + off_term)).max(0.0).sqrt();
    if n_on < alpha * n_off {
        -s
    } else {
        s
    }
}

/// Li & Ma (1983) eq. 5 significance.
pub fn li_ma_eq5_significance(n_on: f64, n_off: f64, alpha: f64) -> f64 {
    if !valid_counts(n_on, n_off, alpha) {
        return f64::NAN;
    }
    let variance = alpha * (n_on + n_off);
    if variance <= 0.0 {
        return 0.0;
    }
    (n_on - alpha * n_off) / variance.sqrt()
}

/// Excess divided by the square root of the expected on-region background.
pub fn simple_significance(n_on: f64, n_off: f64, alpha: f64) -> f64 {
    if !valid_counts(n_on, n_off, alpha) {
        return f64::NAN;
    }
    let background = alpha * n_off;
    if background <= 0.0 {
        return 0.0;
    }
    (n_on - background) / background.sqrt()
}
