//! Intersection of line segments with the body surface.

use super::{Body, BodyKind};
use crate::common::points::mirror_y;
use crate::geom3::Plane3;
use crate::{Point3, Vector3};
use tracing::debug;

impl Body {
    /// Intersect the segment from `a` to `b` with the body surface. Returns the intersection
    /// point, or `None` if the segment misses the surface.
    ///
    /// For a flat-panel body the panels are scanned frame interval by frame interval, right panel
    /// then left panel, and the first panel crossed by the segment wins. For a smooth body one of
    /// the two points must be inside the body: the point closer to the body axis is taken as the
    /// inside point, and the intersection is refined iteratively and only reported if the
    /// iteration converged.
    ///
    /// # Arguments
    ///
    /// * `a`: first end of the segment
    /// * `b`: second end of the segment
    ///
    /// returns: Option<OPoint<f64, Const<3>>>
    pub fn intersect(&self, a: &Point3, b: &Point3) -> Option<Point3> {
        match self.kind {
            BodyKind::FlatPanels => self.intersect_flat(a, b),
            BodyKind::Smooth => self.intersect_smooth(a, b),
        }
    }

    fn intersect_flat(&self, a: &Point3, b: &Point3) -> Option<Point3> {
        let ab = b - a;
        let len = ab.norm();
        if len <= 0.0 {
            return None;
        }
        let dir = ab / len;

        let frames = self.frames();
        for (f0, f1) in frames.iter().zip(frames.iter().skip(1)) {
            for k in 0..self.side_line_count() - 1 {
                let lb = f0.points()[k];
                let la = f0.points()[k + 1];
                let tb = f1.points()[k];
                let ta = f1.points()[k + 1];

                if let Some(p) = self.cross_quad(a, b, &dir, &la, &ta, &lb, &tb) {
                    return Some(p);
                }

                let (la, ta, lb, tb) = (mirror_y(&la), mirror_y(&ta), mirror_y(&lb), mirror_y(&tb));
                if let Some(p) = self.cross_quad(a, b, &dir, &la, &ta, &lb, &tb) {
                    return Some(p);
                }
            }
        }
        None
    }

    /// Find where the line through `a` along `dir` crosses the plane of the quad, and accept the
    /// crossing if it lies within the four edges and between `a` and `b`.
    #[allow(clippy::too_many_arguments)]
    fn cross_quad(
        &self,
        a: &Point3,
        b: &Point3,
        dir: &Vector3,
        la: &Point3,
        ta: &Point3,
        lb: &Point3,
        tb: &Point3,
    ) -> Option<Point3> {
        let plane = Plane3::from_quad(la, ta, lb, tb)?;
        let t = plane.line_parameter(a, dir)?;
        let p = a + dir * t;
        let n = plane.normal.into_inner();

        let tol = self.params.edge_tolerance;
        let inside_edge = |start: &Point3, end: &Point3| {
            let prod = (end - start).cross(&(p - start));
            prod.norm() < tol || prod.dot(&n) >= 0.0
        };

        let within = inside_edge(ta, tb)
            && inside_edge(tb, lb)
            && inside_edge(lb, la)
            && inside_edge(la, ta)
            && (a - p).dot(&(b - p)) <= 0.0;

        within.then_some(p)
    }

    fn intersect_smooth(&self, a: &Point3, b: &Point3) -> Option<Point3> {
        let ra = a.y.hypot(a.z);
        let rb = b.y.hypot(b.z);
        let (m0, m1) = if ra < rb { (b, a) } else { (a, b) };
        let right = m0.y >= 0.0;

        if !self.is_in_body(m1.x, m1.z) {
            return None;
        }

        let d = m1 - m0;
        let d2 = d.norm_squared();
        if d2 <= 0.0 {
            return None;
        }

        let mut i = Point3::from((m0.coords + m1.coords) / 2.0);
        let mut t = 0.5;
        let mut step = f64::MAX;
        let mut iter = 0;
        while step > self.params.intersect_tolerance && iter < self.params.intersect_max_iter {
            let previous = t;
            let u = self.longitudinal_parameter(i.x);
            let v = self.hoop_parameter(u, &Vector3::new(0.0, i.y, i.z), right);
            let n = self.point(u, v, right);

            t = -(m0 - n).dot(&d) / d2;
            i = m0 + d * t;
            step = (t - previous).abs();
            iter += 1;
        }

        if step < self.params.intersect_tolerance {
            Some(i)
        } else {
            debug!(
                "smooth intersection did not converge after {} iterations, last step {:e}",
                iter, step
            );
            None
        }
    }
}
