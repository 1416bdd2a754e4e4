//! Piecewise-linear interpolation helpers.

/// Linear interpolation between two points, evaluated at `x`.
///
/// Degenerate segments (`x0 == x1`) return the mean of the two ordinates.
pub fn lerp_points(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    let dx = x1 - x0;
    if dx == 0.0 {
        return 0.5 * (y0 + y1);
    }
    y0 + (y1 - y0) * (x - x0) / dx
}

/// Piecewise-linear interpolation over samples sorted by ascending x.
///
/// Values outside the sampled range clamp to the edge ordinate. Returns None
/// for empty input or NaN `x`.
pub fn interpolate_clamped(points: &[(f64, f64)], x: f64) -> Option<f64> {
    if points.is_empty() || x.is_nan() {
        return None;
    }
    let first = points[0];
    let last = points[points.len() - 1];
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    // First sample strictly to the right of x; guaranteed in 1..len.
    let upper = points.partition_point(|(px, _)| *px <= x);
    let (x0, y0) = points[upper - 1];
    let (x1, y1) = points[upper];
    Some(lerp_points(x0, y0, x1, y1, x))
}

/// Bilinear interpolation on a grid of rows.
///
/// Each row is `(row_coordinate, samples)` with samples sorted by ascending
/// column coordinate and rows sorted by ascending row coordinate. The column
/// lookup clamps within each row; the row lookup clamps at the outer rows.
pub fn interpolate_rows(rows: &[(f64, Vec<(f64, f64)>)], row: f64, column: f64) -> Option<f64> {
    if rows.is_empty() || row.is_nan() {
        return None;
    }
    let first = &rows[0];
    let last = &rows[rows.len() - 1];
    if row <= first.0 {
        return interpolate_clamped(&first.1, column);
    }
    if row >= last.0 {
        return interpolate_clamped(&last.1, column);
    }
    let upper = rows.partition_point(|(r, _)| *r <= row);
    let (r0, lower_samples) = (rows[upper - 1].0, &rows[upper - 1].1);
    let (r1, upper_samples) = (rows[upper].0, &rows[upper].1);
    let v0 = interpolate_clamped(lower_samples, column)?;
    let v1 = interpolate_clamped(upper_samples, column)?;
    Some(lerp_points(r0, v0, r1, v1, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn lerp_basic() {
        assert!(approx_eq(lerp_points(0.0, 0.0, 2.0, 4.0, 1.0), 2.0, 1e-12));
        assert!(approx_eq(lerp_points(1.0, 3.0, 1.0, 5.0, 1.0), 4.0, 1e-12));
    }

    #[test]
    fn clamped_interpolation() {
        let pts = [(0.0, 1.0), (1.0, 3.0), (2.0, 2.0)];
        assert_eq!(interpolate_clamped(&pts, -5.0), Some(1.0));
        assert_eq!(interpolate_clamped(&pts, 5.0), Some(2.0));
        assert!(approx_eq(interpolate_clamped(&pts, 0.5).unwrap(), 2.0, 1e-12));
        assert!(approx_eq(interpolate_clamped(&pts, 1.5).unwrap(), 2.5, 1e-12));
        assert_eq!(interpolate_clamped(&pts, 1.0), Some(3.0));
        assert_eq!(interpolate_clamped(&[], 1.0), None);
        assert_eq!(interpolate_clamped(&pts, f64::NAN), None);
    }

    #[test]
    fn row_interpolation() {
        let rows = vec![
            (20.0, vec![(0.0, 1.0), (1.0, 2.0)]),
            (40.0, vec![(0.0, 3.0), (1.0, 4.0)]),
        ];
        assert!(approx_eq(interpolate_rows(&rows, 30.0, 0.5).unwrap(), 2.5, 1e-12));
        assert!(approx_eq(interpolate_rows(&rows, 10.0, 0.5).unwrap(), 1.5, 1e-12));
        assert!(approx_eq(interpolate_rows(&rows, 60.0, 2.0).unwrap(), 4.0, 1e-12));
    }
}
