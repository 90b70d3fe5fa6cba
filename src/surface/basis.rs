//! B-spline knot vectors and basis functions.

/// Largest parameter value at which the basis is evaluated. The last knot span is half-open, so
/// parameters at the upper end of the domain are pulled just inside it.
pub const PARAM_MAX: f64 = 0.99999999999;

/// The degree actually usable with `count` control points, which cannot exceed `count - 1`.
pub fn effective_degree(requested: usize, count: usize) -> usize {
    requested.min(count.saturating_sub(1))
}

/// Build a clamped, uniformly spaced knot vector for `count` control points of the given degree.
/// The vector has `count + degree + 1` entries, the first `degree + 1` of them equal to 0 and the
/// last `degree + 1` equal to 1.
///
/// # Examples
///
/// ```
/// use bodygeom::surface::basis::clamped_knots;
/// let knots = clamped_knots(5, 3);
/// assert_eq!(knots, vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0]);
/// ```
pub fn clamped_knots(count: usize, degree: usize) -> Vec<f64> {
    let n_knots = count + degree + 1;
    let spans = count.saturating_sub(degree) as f64;

    (0..n_knots)
        .map(|j| {
            if j <= degree {
                0.0
            } else if j < count && spans > 0.0 {
                (j - degree) as f64 / spans
            } else {
                1.0
            }
        })
        .collect()
}

/// Cox-de Boor recursion for the basis function `i` of degree `p` at parameter `t`. Terms with a
/// zero-length knot span are taken as zero.
pub fn spline_blend(i: usize, p: usize, t: f64, knots: &[f64]) -> f64 {
    if p == 0 {
        return if knots[i] <= t && t < knots[i + 1] {
            1.0
        } else {
            0.0
        };
    }

    let mut value = 0.0;
    let left = knots[i + p] - knots[i];
    if left.abs() > 0.0 {
        value += (t - knots[i]) / left * spline_blend(i, p - 1, t, knots);
    }
    let right = knots[i + p + 1] - knots[i + 1];
    if right.abs() > 0.0 {
        value += (knots[i + p + 1] - t) / right * spline_blend(i + 1, p - 1, t, knots);
    }
    value
}

/// Evaluate all `count` basis functions of the given degree at `t`, with `t` clamped into the
/// evaluable domain.
pub fn basis_values(knots: &[f64], degree: usize, count: usize, t: f64) -> Vec<f64> {
    let t = t.clamp(0.0, PARAM_MAX);
    (0..count).map(|i| spline_blend(i, degree, t, knots)).collect()
}
