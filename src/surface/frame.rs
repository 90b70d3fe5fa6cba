use crate::common::lerp;
use crate::common::points::mid_point;
use crate::Point3;
use serde::{Deserialize, Serialize};

/// A single cross-section of the body: a longitudinal station and the ordered control points of
/// the right half of the section, running clockwise when looking forward from aft, so that the
/// first point is at the top of the section and the last point at the bottom.
///
/// The x coordinate of every control point is always equal to the frame position; any point
/// handed to a frame is re-pinned to the station, which keeps each cross-section planar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    position: f64,
    points: Vec<Point3>,
}

impl Frame {
    /// Create a frame at a longitudinal position from a list of control points. The x coordinate
    /// of each point is replaced by the frame position.
    pub fn new(position: f64, points: Vec<Point3>) -> Self {
        let mut frame = Self { position, points };
        frame.pin();
        frame
    }

    /// Create a frame from (y, z) pairs of the section.
    ///
    /// # Examples
    ///
    /// ```
    /// use bodygeom::Frame;
    /// let f = Frame::from_yz(1.5, &[(0.0, 1.0), (1.0, 0.0), (0.0, -1.0)]);
    /// assert_eq!(f.len(), 3);
    /// assert_eq!(f.points()[1].x, 1.5);
    /// ```
    pub fn from_yz(position: f64, yz: &[(f64, f64)]) -> Self {
        let points = yz
            .iter()
            .map(|(y, z)| Point3::new(position, *y, *z))
            .collect();
        Self { position, points }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<&Point3> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The vertical center of the section, taken between the top and bottom control points.
    pub fn z_center(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => (a.z + b.z) / 2.0,
            _ => 0.0,
        }
    }

    /// Component-wise blend of two frames with the same number of points, `f = 0` returning a
    /// copy of `a` and `f = 1` a copy of `b`.
    pub(crate) fn blend(a: &Frame, b: &Frame, f: f64) -> Frame {
        let points = a
            .points
            .iter()
            .zip(b.points.iter())
            .map(|(pa, pb)| Point3::from(pa.coords * (1.0 - f) + pb.coords * f))
            .collect();
        Frame::new(lerp(a.position, b.position, f), points)
    }

    /// A copy of this frame moved to a new longitudinal position.
    pub(crate) fn copied_at(&self, position: f64) -> Frame {
        Frame::new(position, self.points.clone())
    }

    pub(crate) fn set_position(&mut self, position: f64) {
        self.position = position;
        self.pin();
    }

    pub(crate) fn set_point(&mut self, index: usize, point: Point3) {
        if let Some(p) = self.points.get_mut(index) {
            *p = Point3::new(self.position, point.y, point.z);
        }
    }

    pub(crate) fn insert_point(&mut self, index: usize, point: Point3) {
        let index = index.min(self.points.len());
        self.points
            .insert(index, Point3::new(self.position, point.y, point.z));
    }

    /// Insert a point at `index` placed halfway between its neighbours, or duplicating the end
    /// point when inserting at either end.
    pub(crate) fn insert_midpoint(&mut self, index: usize) {
        let n = self.points.len();
        if n == 0 {
            return;
        }
        let index = index.min(n);
        let p = if index == 0 {
            self.points[0]
        } else if index == n {
            self.points[n - 1]
        } else {
            mid_point(&self.points[index - 1], &self.points[index])
        };
        self.points.insert(index, p);
    }

    pub(crate) fn remove_point(&mut self, index: usize) {
        if index < self.points.len() {
            self.points.remove(index);
        }
    }

    pub(crate) fn translate(&mut self, dx: f64, dz: f64) {
        self.position += dx;
        for p in self.points.iter_mut() {
            p.z += dz;
        }
        self.pin();
    }

    pub(crate) fn scale_section(&mut self, y_factor: f64, z_factor: f64) {
        for p in self.points.iter_mut() {
            p.y *= y_factor;
            p.z *= z_factor;
        }
        self.pin();
    }

    fn pin(&mut self) {
        for p in self.points.iter_mut() {
            p.x = self.position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring(x: f64) -> Frame {
        Frame::from_yz(x, &[(0.0, 1.0), (1.0, 0.0), (0.0, -1.0)])
    }

    #[test]
    fn new_pins_points_to_station() {
        let f = Frame::new(2.0, vec![Point3::new(5.0, 1.0, 1.0)]);
        assert_eq!(f.points()[0], Point3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn blend_midway() {
        let a = ring(0.0);
        let mut b = ring(2.0);
        b.scale_section(3.0, 3.0);
        let m = Frame::blend(&a, &b, 0.5);
        assert_relative_eq!(m.position(), 1.0);
        assert_relative_eq!(m.points()[1], Point3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn midpoint_insertion() {
        let mut f = ring(0.0);
        f.insert_midpoint(1);
        assert_eq!(f.len(), 4);
        assert_relative_eq!(f.points()[1], Point3::new(0.0, 0.5, 0.5));
        f.insert_midpoint(4);
        assert_relative_eq!(f.points()[4], Point3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn translate_keeps_pinning() {
        let mut f = ring(1.0);
        f.translate(0.5, -1.0);
        assert_relative_eq!(f.position(), 1.5);
        assert!(f.points().iter().all(|p| p.x == 1.5));
        assert_relative_eq!(f.z_center(), -1.0);
    }
}
