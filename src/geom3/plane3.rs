use crate::{Point3, UnitVec3, Vector3};

#[derive(Debug, Clone)]
pub struct Plane3 {
    pub normal: UnitVec3,
    pub d: f64,
}

impl Plane3 {
    pub fn new(normal: UnitVec3, d: f64) -> Self {
        Self { normal, d }
    }

    /// Create a plane passing through a point with the given normal direction.
    pub fn from_point_and_normal(point: &Point3, normal: &UnitVec3) -> Self {
        let d = normal.dot(&point.coords);
        Self::new(*normal, d)
    }

    /// Create the plane of a quadrilateral panel, passing through the mean of the four corners and
    /// with a normal built from the cross product of the two diagonals. The corners are the
    /// leading/trailing points on the `a` and `b` side-lines. Returns `None` when the diagonals
    /// are parallel or the panel has collapsed to a point.
    ///
    /// # Arguments
    ///
    /// * `la`: leading corner on side-line `a`
    /// * `ta`: trailing corner on side-line `a`
    /// * `lb`: leading corner on side-line `b`
    /// * `tb`: trailing corner on side-line `b`
    ///
    /// returns: Option<Plane3>
    pub fn from_quad(la: &Point3, ta: &Point3, lb: &Point3, tb: &Point3) -> Option<Self> {
        let d1 = la - tb;
        let d2 = lb - ta;
        let normal = UnitVec3::try_new(d2.cross(&d1), 1e-14)?;
        let center = Point3::from((la.coords + ta.coords + lb.coords + tb.coords) / 4.0);
        Some(Self::from_point_and_normal(&center, &normal))
    }

    /// Measure and return the signed distance from the plane to a point in 3D space. The sign of
    /// the distance indicates whether the point is above or below the plane according to the
    /// plane's normal vector.
    pub fn signed_distance_to_point(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) - self.d
    }

    /// Find the parameter `t` such that `origin + direction * t` lies on the plane. Returns `None`
    /// only when the line is exactly parallel to the plane.
    pub fn line_parameter(&self, origin: &Point3, direction: &Vector3) -> Option<f64> {
        let denom = self.normal.dot(direction);
        if denom.abs() > 0.0 {
            Some(-self.signed_distance_to_point(origin) / denom)
        } else {
            None
        }
    }
}
