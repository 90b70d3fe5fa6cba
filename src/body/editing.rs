//! Structural edits of the frames and control points of a body. Every edit keeps all frames at
//! the same number of side-lines, keeps the panel density tables the same length as the frame
//! and side-line lists, keeps the frames in strictly increasing longitudinal order, and drops the
//! cached panel mesh.

use super::{Body, FrameTarget};
use crate::errors::BodyError;
use crate::surface::Frame;
use crate::{Point3, Vector3};
use tracing::debug;

/// Longitudinal offset of a frame added before the nose or after the tail.
const END_FRAME_OFFSET: f64 = 0.1;

/// Two frames closer than this share a station.
const STATION_TOLERANCE: f64 = 1.0e-9;

impl Body {
    /// Insert a new frame before the frame at `index`. Between two frames the new frame is the
    /// midway blend of its neighbours; before the first frame it is a copy of the first frame
    /// moved forward. Returns the index of the new frame.
    pub fn insert_frame_before(&mut self, index: usize) -> Result<usize, BodyError> {
        self.check_frame(index)?;
        let frames = self.surface.frames();
        let frame = if index == 0 {
            frames[0].copied_at(frames[0].position() - END_FRAME_OFFSET)
        } else {
            Frame::blend(&frames[index - 1], &frames[index], 0.5)
        };
        self.add_frame(index, frame);
        Ok(index)
    }

    /// Insert a new frame after the frame at `index`, see `insert_frame_before`. Returns the
    /// index of the new frame.
    pub fn insert_frame_after(&mut self, index: usize) -> Result<usize, BodyError> {
        self.check_frame(index)?;
        let frames = self.surface.frames();
        let frame = if index + 1 == frames.len() {
            frames[index].copied_at(frames[index].position() + END_FRAME_OFFSET)
        } else {
            Frame::blend(&frames[index], &frames[index + 1], 0.5)
        };
        self.add_frame(index + 1, frame);
        Ok(index + 1)
    }

    /// Insert a new frame at the longitudinal position `point.x`. Inside the body the section is
    /// interpolated from the bracketing frames, outside it is a copy of the nearest end frame.
    /// The new section is then moved vertically so that its center lies at `point.z`. Returns
    /// the index of the new frame, or an error if a frame already sits at `point.x`.
    pub fn insert_frame_at(&mut self, point: &Point3) -> Result<usize, BodyError> {
        let frames = self.surface.frames();
        let n = frames.len();
        let x = point.x;
        if !x.is_finite() {
            return Err(BodyError::InvalidField("frame position"));
        }
        if let Some(i) = frames
            .iter()
            .position(|f| (f.position() - x).abs() < STATION_TOLERANCE)
        {
            return Err(BodyError::FramesOutOfOrder { index: i });
        }

        let (index, mut frame) = if x < frames[0].position() {
            (0, frames[0].copied_at(x))
        } else if x >= frames[n - 1].position() {
            (n, frames[n - 1].copied_at(x))
        } else {
            let i = frames
                .windows(2)
                .position(|w| w[0].position() <= x && x < w[1].position())
                .unwrap_or(0);
            let (a, b) = (&frames[i], &frames[i + 1]);
            let f = (x - a.position()) / (b.position() - a.position());
            let mut blended = Frame::blend(a, b, f);
            blended.set_position(x);
            (i + 1, blended)
        };

        let dz = point.z - frame.z_center();
        frame.translate(0.0, dz);
        self.add_frame(index, frame);
        Ok(index)
    }

    fn add_frame(&mut self, index: usize, frame: Frame) {
        debug!("inserting frame at {} (x = {})", index, frame.position());
        self.surface.insert_frame(index, frame);
        self.x_panels.insert(index.min(self.x_panels.len()), 1);
        self.invalidate();
    }

    /// Insert a control point into the frame at `frame` at position `index` of its point list.
    /// Every other frame gets a point at the same index, halfway between its neighbours. Returns
    /// the index of the new side-line.
    pub fn insert_point(
        &mut self,
        frame: usize,
        index: usize,
        point: &Point3,
    ) -> Result<usize, BodyError> {
        self.check_frame(frame)?;
        let index = index.min(self.side_line_count());
        self.surface.insert_side_line(frame, index, *point);
        self.h_panels.insert(index.min(self.h_panels.len()), 1);
        self.invalidate();
        debug!("inserted side-line {} from frame {}", index, frame);
        Ok(index)
    }

    /// Remove the frame at `index`. A body keeps at least two frames. Returns the index of the
    /// frame that now occupies the removed position, clamped to the last frame.
    pub fn remove_frame(&mut self, index: usize) -> Result<usize, BodyError> {
        self.check_frame(index)?;
        if self.frame_count() <= 2 {
            return Err(BodyError::NotEnoughFrames);
        }
        self.surface.remove_frame(index);
        if index < self.x_panels.len() {
            self.x_panels.remove(index);
        }
        self.invalidate();
        debug!("removed frame {}", index);
        Ok(index.min(self.frame_count() - 1))
    }

    /// Remove the side-line at `index` from every frame. Frames keep at least two side-lines.
    pub fn remove_side_line(&mut self, index: usize) -> Result<(), BodyError> {
        let len = self.side_line_count();
        if index >= len {
            return Err(BodyError::IndexOutOfRange { index, len });
        }
        if len <= 2 {
            return Err(BodyError::NotEnoughSideLines);
        }
        self.surface.remove_side_line(index);
        if index < self.h_panels.len() {
            self.h_panels.remove(index);
        }
        self.invalidate();
        debug!("removed side-line {}", index);
        Ok(())
    }

    /// Scale the body or a single frame. Scaling the whole body also scales the frame positions
    /// by `xf`, which must be positive; scaling a frame changes only its section.
    pub fn scale(&mut self, xf: f64, yf: f64, zf: f64, target: FrameTarget) -> Result<(), BodyError> {
        match target {
            FrameTarget::All => {
                if !(xf.is_finite() && xf > 0.0) {
                    return Err(BodyError::InvalidScale(xf));
                }
                for frame in self.surface.frames_mut() {
                    frame.set_position(frame.position() * xf);
                    frame.scale_section(yf, zf);
                }
            }
            FrameTarget::Frame(i) => {
                self.check_frame(i)?;
                self.surface.frames_mut()[i].scale_section(yf, zf);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Translate the body or a single frame. Frames stay centered on the symmetry plane, so `dy`
    /// only applies to the point masses, which move with the whole body. A single frame may not
    /// reach the position of either neighbour.
    pub fn translate(
        &mut self,
        dx: f64,
        dy: f64,
        dz: f64,
        target: FrameTarget,
    ) -> Result<(), BodyError> {
        match target {
            FrameTarget::All => {
                for frame in self.surface.frames_mut() {
                    frame.translate(dx, dz);
                }
                let shift = Vector3::new(dx, dy, dz);
                for pm in self.point_masses.iter_mut() {
                    pm.position += shift;
                }
            }
            FrameTarget::Frame(i) => {
                self.check_frame(i)?;
                self.check_station(i, self.frame_position(i) + dx)?;
                self.surface.frames_mut()[i].translate(dx, dz);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Move a single control point. The x coordinate is ignored, the point stays on its frame.
    pub fn set_control_point(
        &mut self,
        frame: usize,
        index: usize,
        point: &Point3,
    ) -> Result<(), BodyError> {
        self.check_frame(frame)?;
        let len = self.side_line_count();
        if index >= len {
            return Err(BodyError::IndexOutOfRange { index, len });
        }
        self.surface.frames_mut()[frame].set_point(index, *point);
        self.invalidate();
        Ok(())
    }

    /// Set the requested interpolation degrees of the smooth surface. The degree actually used
    /// never exceeds the number of frames or side-lines less one.
    pub fn set_degrees(&mut self, u_degree: usize, v_degree: usize) {
        self.surface.set_degrees(u_degree, v_degree);
        self.invalidate();
    }

    /// Set the weights of the boundary rows and columns of control points of the smooth surface.
    pub fn set_edge_weights(&mut self, u: f64, v: f64) {
        self.surface.set_edge_weights(u, v);
        self.invalidate();
    }

    fn check_frame(&self, index: usize) -> Result<(), BodyError> {
        let len = self.frame_count();
        if index < len {
            Ok(())
        } else {
            Err(BodyError::IndexOutOfRange { index, len })
        }
    }

    /// Check that the frame at `index` could move to `x` and stay strictly between its neighbours.
    fn check_station(&self, index: usize, x: f64) -> Result<(), BodyError> {
        let frames = self.surface.frames();
        let after_prev = index == 0 || frames[index - 1].position() < x;
        let before_next = index + 1 >= frames.len() || x < frames[index + 1].position();
        if x.is_finite() && after_prev && before_next {
            Ok(())
        } else {
            Err(BodyError::FramesOutOfOrder { index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::tests::round_tube;
    use crate::body::{BodyKind, PointMass};
    use approx::assert_relative_eq;

    fn ordered(body: &Body) {
        assert!(
            body.frames()
                .windows(2)
                .all(|w| w[0].position() < w[1].position())
        );
    }

    fn consistent(body: &Body) {
        let n = body.side_line_count();
        assert!(body.frames().iter().all(|f| f.len() == n));
        assert_eq!(body.x_panels().len(), body.frame_count());
        assert_eq!(body.h_panels().len(), n);
        ordered(body);
        assert!(
            body.frames()
                .iter()
                .all(|f| f.points().iter().all(|p| p.x == f.position()))
        );
    }

    #[test]
    fn insert_interior_frame_is_midway() {
        let mut body = Body::default();
        let i = body.insert_frame_after(2).unwrap();
        assert_eq!(i, 3);
        assert_eq!(body.frame_count(), 8);
        assert_relative_eq!(body.frame_position(3), (-0.051 + 0.094) / 2.0);
        let expected = (body.frames()[2].points()[1].y + body.frames()[4].points()[1].y) / 2.0;
        assert_relative_eq!(body.frames()[3].points()[1].y, expected);
        consistent(&body);
    }

    #[test]
    fn insert_frames_at_ends_copy() {
        let mut body = Body::default();
        assert_eq!(body.insert_frame_before(0).unwrap(), 0);
        assert_relative_eq!(body.frame_position(0), -0.343, epsilon = 1e-12);
        assert_eq!(body.frames()[0].points()[0].z, body.frames()[1].points()[0].z);

        let last = body.insert_frame_after(body.frame_count() - 1).unwrap();
        assert_eq!(last, 8);
        assert_relative_eq!(body.frame_position(8), 0.819, epsilon = 1e-12);
        consistent(&body);
    }

    #[test]
    fn insert_then_remove_is_identity() {
        let mut body = Body::default();
        let before = body.frames().to_vec();
        let knots = body.surface().u_knots().to_vec();

        let i = body.insert_frame_at(&Point3::new(0.15, 0.0, 0.01)).unwrap();
        assert_eq!(i, 4);
        assert_relative_eq!(body.frames()[4].z_center(), 0.01, epsilon = 1e-12);
        consistent(&body);

        body.remove_frame(i).unwrap();
        assert_eq!(body.frames(), before.as_slice());
        assert_eq!(body.surface().u_knots(), knots.as_slice());
        consistent(&body);
    }

    #[test]
    fn insert_frame_at_outside_body() {
        let mut body = round_tube();
        assert_eq!(body.insert_frame_at(&Point3::new(-1.0, 0.0, 0.5)), Ok(0));
        assert_relative_eq!(body.frames()[0].z_center(), 0.5);
        assert_eq!(body.frames()[0].position(), -1.0);

        let n = body.frame_count();
        assert_eq!(body.insert_frame_at(&Point3::new(9.0, 0.0, 0.0)), Ok(n));
        consistent(&body);
    }

    #[test]
    fn insert_frame_at_existing_station_rejected() {
        let mut body = round_tube();
        assert_eq!(
            body.insert_frame_at(&Point3::new(4.0, 0.0, 0.0)),
            Err(BodyError::FramesOutOfOrder { index: 4 })
        );
        assert_eq!(
            body.insert_frame_at(&Point3::new(2.0, 0.0, 0.3)),
            Err(BodyError::FramesOutOfOrder { index: 2 })
        );
        assert_eq!(body.frame_count(), 5);
        ordered(&body);
    }

    #[test]
    fn insert_point_keeps_side_lines_equal() {
        let mut body = Body::default();
        let k = body.insert_point(2, 1, &Point3::new(9.0, 0.02, 0.04)).unwrap();
        assert_eq!(k, 1);
        assert_eq!(body.side_line_count(), 6);
        assert_relative_eq!(
            body.frames()[2].points()[1],
            Point3::new(-0.051, 0.02, 0.04),
            epsilon = 1e-12
        );

        // other frames get the midpoint of the neighbours
        let f3 = &body.frames()[3];
        assert_relative_eq!(f3.points()[1].y, 0.006, epsilon = 1e-12);
        assert_relative_eq!(f3.points()[1].z, 0.022, epsilon = 1e-12);
        consistent(&body);
    }

    #[test]
    fn removals_keep_minimum() {
        let mut body = round_tube();
        for _ in 0..3 {
            body.remove_frame(0).unwrap();
        }
        assert_eq!(body.remove_frame(0), Err(BodyError::NotEnoughFrames));
        assert_eq!(body.remove_frame(1).unwrap_err(), BodyError::NotEnoughFrames);

        body.remove_side_line(1).unwrap();
        body.remove_side_line(1).unwrap();
        assert_eq!(body.remove_side_line(0), Err(BodyError::NotEnoughSideLines));
        assert_eq!(
            body.remove_side_line(5),
            Err(BodyError::IndexOutOfRange { index: 5, len: 2 })
        );
        consistent(&body);
    }

    #[test]
    fn remove_returns_clamped_index() {
        let mut body = round_tube();
        assert_eq!(body.remove_frame(4).unwrap(), 3);
        assert_eq!(body.remove_frame(1).unwrap(), 1);
    }

    #[test]
    fn scale_whole_body_and_frame() {
        let mut body = round_tube();
        body.scale(2.0, 0.5, 3.0, FrameTarget::All).unwrap();
        assert_relative_eq!(body.length(), 8.0);
        assert_relative_eq!(body.frames()[1].points()[1], Point3::new(2.0, 0.5, 3.0));

        body.scale(1.0, 2.0, 1.0, FrameTarget::Frame(1)).unwrap();
        assert_relative_eq!(body.frames()[1].points()[1], Point3::new(2.0, 1.0, 3.0));
        assert_relative_eq!(body.frames()[2].points()[1], Point3::new(4.0, 0.5, 3.0));
        assert!(body.scale(1.0, 1.0, 1.0, FrameTarget::Frame(10)).is_err());
    }

    #[test]
    fn scale_rejects_non_positive_length_factor() {
        let mut body = round_tube();
        assert_eq!(
            body.scale(-1.0, 1.0, 1.0, FrameTarget::All),
            Err(BodyError::InvalidScale(-1.0))
        );
        assert!(body.scale(0.0, 1.0, 1.0, FrameTarget::All).is_err());
        assert_relative_eq!(body.length(), 4.0);
        ordered(&body);
    }

    #[test]
    fn translate_ignores_y_for_frames() {
        let mut body = round_tube();
        body.point_masses
            .push(PointMass::new(1.0, Point3::new(1.0, 0.0, 0.0), "lead"));
        body.translate(1.0, 5.0, -1.0, FrameTarget::All).unwrap();
        assert_relative_eq!(body.frames()[0].points()[1], Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(body.point_masses[0].position, Point3::new(2.0, 5.0, -1.0));

        body.translate(0.5, 5.0, 1.0, FrameTarget::Frame(2)).unwrap();
        assert_relative_eq!(body.frames()[2].points()[0], Point3::new(3.5, 0.0, 1.0));
        assert_relative_eq!(body.point_masses[0].position, Point3::new(2.0, 5.0, -1.0));
    }

    #[test]
    fn frame_cannot_pass_its_neighbours() {
        let mut body = round_tube();
        assert_eq!(
            body.translate(10.0, 0.0, 0.0, FrameTarget::Frame(1)),
            Err(BodyError::FramesOutOfOrder { index: 1 })
        );
        assert_eq!(
            body.translate(-1.0, 0.0, 0.0, FrameTarget::Frame(3)),
            Err(BodyError::FramesOutOfOrder { index: 3 })
        );
        let xs: Vec<f64> = body.frames().iter().map(|f| f.position()).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        // the end frames are only bounded on one side
        body.translate(-5.0, 0.0, 0.0, FrameTarget::Frame(0)).unwrap();
        body.translate(0.9, 0.0, 0.0, FrameTarget::Frame(3)).unwrap();
        assert_eq!(body.frame_position(0), -5.0);
        ordered(&body);
    }

    #[test]
    fn control_point_edit_invalidates_mesh() {
        let mut body = round_tube();
        body.set_kind(BodyKind::FlatPanels);
        let before = body.panel_mesh().area();
        body.set_control_point(2, 1, &Point3::new(0.0, 2.0, 1.0)).unwrap();
        assert_eq!(body.frames()[2].points()[1], Point3::new(2.0, 2.0, 1.0));
        assert!(body.panel_mesh().area() > before);
    }

    #[test]
    fn degree_changes_rebuild_knots() {
        let mut body = round_tube();
        body.set_degrees(1, 1);
        assert_eq!(body.surface().u_knots().len(), 5 + 1 + 1);
        assert_relative_eq!(body.point(0.5, 0.0, true), Point3::new(2.0, 0.0, 1.0));
    }
}
