//! Common operations on 3D points used across the body geometry.

use crate::{Point3, Vector3};

/// Returns the distance between two points.
///
/// # Examples
///
/// ```
/// use bodygeom::common::points::dist;
/// use bodygeom::Point3;
/// let a = Point3::new(1.0, 2.0, 0.0);
/// let b = Point3::new(3.0, 2.0, 0.0);
/// assert_eq!(dist(&a, &b), 2.0);
/// ```
pub fn dist(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm()
}

/// Returns the midpoint between two points.
///
/// # Examples
///
/// ```
/// use bodygeom::common::points::mid_point;
/// use bodygeom::Point3;
/// let a = Point3::new(1.0, 2.0, 3.0);
/// let b = Point3::new(3.0, 4.0, 5.0);
/// assert_eq!(mid_point(&a, &b), Point3::new(2.0, 3.0, 4.0));
/// ```
pub fn mid_point(a: &Point3, b: &Point3) -> Point3 {
    b + (a - b) * 0.5
}

/// Returns the unweighted mean of a set of points. An empty slice gives the origin.
pub fn mean_point(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::origin();
    }
    let mut sum = Vector3::zeros();
    for p in points {
        sum += p.coords;
    }
    Point3::from(sum / points.len() as f64)
}

/// Returns the point reflected across the x-z symmetry plane.
pub fn mirror_y(p: &Point3) -> Point3 {
    Point3::new(p.x, -p.y, p.z)
}

/// Returns the vector reflected across the x-z symmetry plane.
pub fn mirror_y_vec(v: &Vector3) -> Vector3 {
    Vector3::new(v.x, -v.y, v.z)
}

/// Bilinear blend of four corner points. `f` runs along the `a0 -> a1` and `b0 -> b1` edges,
/// `g` runs from the `a` edge to the `b` edge.
pub fn bilinear(a0: &Point3, a1: &Point3, b0: &Point3, b1: &Point3, f: f64, g: f64) -> Point3 {
    let a = a0.coords * (1.0 - f) + a1.coords * f;
    let b = b0.coords * (1.0 - f) + b1.coords * f;
    Point3::from(a * (1.0 - g) + b * g)
}

/// Returns true if the two points are closer than `tol`.
pub fn is_same(a: &Point3, b: &Point3, tol: f64) -> bool {
    dist(a, b) < tol
}

/// Normalizes a vector, returning the zero vector when its length is below `eps`.
pub fn normalize_or_zero(v: &Vector3, eps: f64) -> Vector3 {
    let n = v.norm();
    if n < eps { Vector3::zeros() } else { v / n }
}
