//! The body aggregate. A `Body` owns the interpolated surface, the representation selector, the
//! panel density tables, shell and point masses and the identifying metadata, and it exposes the
//! evaluation, editing, intersection, mass property and force integration operations.
//!
//! The surface is defined on the right half of the body (y >= 0) and the left half is its mirror
//! across the x-z plane. The hoop parameter `v` runs from the top of a section (0) to the bottom
//! (1) and the longitudinal parameter `u` runs from the nose (0) to the tail (1).

mod aero;
mod editing;
mod inertia;
mod intersect;
mod panels;
mod params;

use crate::common::points::{mean_point, mirror_y, normalize_or_zero};
use crate::errors::BodyError;
use crate::surface::{Frame, NurbsSurface};
use crate::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

pub use aero::AeroForces;
pub use inertia::MassProperties;
pub use panels::{Panel, PanelMesh};
pub use params::BodyParams;

/// Selects how the frames are interpolated into a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Bilinear quads between adjacent frames and side-lines
    FlatPanels,

    /// Rational B-spline surface through the frame control points
    Smooth,
}

/// A concentrated mass attached to the body, such as a battery or a servo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMass {
    pub mass: f64,
    pub position: Point3,
    pub tag: String,
}

impl PointMass {
    pub fn new(mass: f64, position: Point3, tag: &str) -> Self {
        Self {
            mass,
            position,
            tag: tag.to_string(),
        }
    }
}

/// Selects the frames affected by a scale or translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    /// Every frame, and for translations the point masses as well
    All,

    /// A single frame by index
    Frame(usize),
}

/// The result of a hoop parameter search, with the information needed to judge convergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoopSearch {
    pub v: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub description: String,
    pub color: [u8; 4],
    pub textures: bool,
    pub point_masses: Vec<PointMass>,
    pub params: BodyParams,

    kind: BodyKind,
    surface: NurbsSurface,
    x_panels: Vec<usize>,
    h_panels: Vec<usize>,
    nx_panels: usize,
    nh_panels: usize,
    bunch: f64,
    shell_mass: f64,
    inertia: MassProperties,

    #[serde(skip)]
    panels: OnceCell<PanelMesh>,
}

impl Default for Body {
    /// A small fuselage with seven frames of five side-lines each, closed to a point at the nose
    /// and the tail.
    fn default() -> Self {
        let frames = vec![
            Frame::from_yz(-0.243, &[(0.0, -0.0172); 5]),
            Frame::from_yz(
                -0.228,
                &[
                    (0.000, 0.005),
                    (0.011, 0.004),
                    (0.013, -0.018),
                    (0.011, -0.030),
                    (0.000, -0.031),
                ],
            ),
            Frame::from_yz(
                -0.051,
                &[
                    (0.000, 0.033),
                    (0.028, 0.036),
                    (0.037, -0.003),
                    (0.034, -0.045),
                    (0.000, -0.049),
                ],
            ),
            Frame::from_yz(
                0.094,
                &[
                    (0.000, 0.025),
                    (0.012, 0.019),
                    (0.018, 0.001),
                    (0.012, -0.017),
                    (0.000, -0.023),
                ],
            ),
            Frame::from_yz(
                0.279,
                &[
                    (0.000, 0.007),
                    (0.006, 0.008),
                    (0.009, 0.000),
                    (0.007, -0.006),
                    (0.000, -0.005),
                ],
            ),
            Frame::from_yz(
                0.705,
                &[
                    (0.000, 0.0124),
                    (0.010, 0.0118),
                    (0.012, -0.0015),
                    (0.010, -0.0116),
                    (0.000, -0.012),
                ],
            ),
            Frame::from_yz(0.719, &[(0.0, 0.0); 5]),
        ];

        Self::with_surface(
            "Body Name",
            BodyKind::Smooth,
            NurbsSurface::from_checked(frames, 3, 3),
        )
    }
}

impl Body {
    /// Create a body from a list of frames. The frames are sorted by position and must all have
    /// the same number of control points.
    ///
    /// # Arguments
    ///
    /// * `name`: the name of the body
    /// * `kind`: how the frames are interpolated
    /// * `frames`: at least two frames with at least two control points each
    ///
    /// returns: Result<Body, BodyError>
    pub fn from_frames(name: &str, kind: BodyKind, frames: Vec<Frame>) -> Result<Self, BodyError> {
        let surface = NurbsSurface::try_new(frames, 3, 3)?;
        Ok(Self::with_surface(name, kind, surface))
    }

    pub(crate) fn with_surface(name: &str, kind: BodyKind, surface: NurbsSurface) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            color: [98, 102, 156, 255],
            textures: false,
            point_masses: Vec::new(),
            params: BodyParams::default(),
            kind,
            x_panels: vec![1; surface.frame_count()],
            h_panels: vec![1; surface.side_line_count()],
            surface,
            nx_panels: 19,
            nh_panels: 11,
            bunch: 0.0,
            shell_mass: 0.0,
            inertia: MassProperties::default(),
            panels: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: BodyKind) {
        self.kind = kind;
        self.invalidate();
    }

    pub fn surface(&self) -> &NurbsSurface {
        &self.surface
    }

    pub fn frames(&self) -> &[Frame] {
        self.surface.frames()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.surface.frame(index)
    }

    pub fn frame_count(&self) -> usize {
        self.surface.frame_count()
    }

    pub fn side_line_count(&self) -> usize {
        self.surface.side_line_count()
    }

    /// The longitudinal position of a frame, or 0 if the index does not exist.
    pub fn frame_position(&self, index: usize) -> f64 {
        self.surface.frame(index).map(|f| f.position()).unwrap_or(0.0)
    }

    /// Number of flat panels between each frame and the next. The table has one entry per frame,
    /// the last one unused.
    pub fn x_panels(&self) -> &[usize] {
        &self.x_panels
    }

    /// Number of flat panels between each side-line and the next, one entry per side-line.
    pub fn h_panels(&self) -> &[usize] {
        &self.h_panels
    }

    pub fn set_x_panels(&mut self, frame: usize, count: usize) -> Result<(), BodyError> {
        let len = self.x_panels.len();
        let slot = self
            .x_panels
            .get_mut(frame)
            .ok_or(BodyError::IndexOutOfRange { index: frame, len })?;
        *slot = count.max(1);
        self.invalidate();
        Ok(())
    }

    pub fn set_h_panels(&mut self, side_line: usize, count: usize) -> Result<(), BodyError> {
        let len = self.h_panels.len();
        let slot = self
            .h_panels
            .get_mut(side_line)
            .ok_or(BodyError::IndexOutOfRange {
                index: side_line,
                len,
            })?;
        *slot = count.max(1);
        self.invalidate();
        Ok(())
    }

    /// Longitudinal and hoop panel counts used to mesh the smooth surface.
    pub fn mesh_resolution(&self) -> (usize, usize) {
        (self.nx_panels, self.nh_panels)
    }

    pub fn set_mesh_resolution(&mut self, nx: usize, nh: usize) {
        self.nx_panels = nx.max(1);
        self.nh_panels = nh.max(1);
        self.invalidate();
    }

    pub fn bunch(&self) -> f64 {
        self.bunch
    }

    /// Set the longitudinal bunching of the smooth mesh, 0 for nearly uniform spacing up to 1 for
    /// panels strongly concentrated at the nose and tail.
    pub fn set_bunch(&mut self, bunch: f64) {
        self.bunch = bunch.clamp(0.0, 1.0);
        self.invalidate();
    }

    /// The mass distributed uniformly over the skin of the body.
    pub fn shell_mass(&self) -> f64 {
        self.shell_mass
    }

    pub fn set_shell_mass(&mut self, mass: f64) {
        self.shell_mass = mass;
    }

    /// The distance from the first frame to the last one.
    pub fn length(&self) -> f64 {
        (self.surface.last_position() - self.surface.first_position()).abs()
    }

    /// The nose of the body: the first frame position, on the symmetry plane, at the vertical
    /// center of the first section.
    pub fn leading_point(&self) -> Point3 {
        match self.surface.frame(0) {
            Some(f) => Point3::new(f.position(), 0.0, f.z_center()),
            None => Point3::origin(),
        }
    }

    /// The point halfway between the top and bottom of the section at parameter `u`.
    pub fn center_point(&self, u: f64) -> Point3 {
        let top = self.point(u, 0.0, true);
        let bottom = self.point(u, 1.0, true);
        mean_point(&[top, bottom])
    }

    /// Evaluate a point on the body surface.
    ///
    /// # Arguments
    ///
    /// * `u`: longitudinal parameter in [0, 1]
    /// * `v`: hoop parameter in [0, 1], 0 at the top of the section
    /// * `right`: true for the right half of the body, false for its mirror
    ///
    /// returns: OPoint<f64, Const<3>>
    pub fn point(&self, u: f64, v: f64, right: bool) -> Point3 {
        let p = match self.kind {
            BodyKind::FlatPanels => self.surface.flat_point(u, v),
            BodyKind::Smooth => self.surface.point(u, v),
        };
        if right { p } else { mirror_y(&p) }
    }

    /// The longitudinal parameter at the absolute position `x`. Frames must be in increasing
    /// order of position for the result to be meaningful.
    pub fn longitudinal_parameter(&self, x: f64) -> f64 {
        match self.kind {
            BodyKind::FlatPanels => self.surface.flat_u_at_x(x),
            BodyKind::Smooth => self.surface.u_at_x(x),
        }
    }

    /// Find the hoop parameter of the surface point at `u` whose radial direction in the y-z
    /// plane is parallel to `direction`. Returns the best estimate and whether the residual met
    /// the tolerance.
    pub fn hoop_search(&self, u: f64, direction: &Vector3, right: bool) -> HoopSearch {
        let degenerate = HoopSearch {
            v: 0.0,
            iterations: 0,
            converged: false,
        };
        if u <= 0.0 || u >= 1.0 {
            return degenerate;
        }
        let r = Vector3::new(0.0, direction.y, direction.z);
        let norm = r.norm();
        if norm < 1.0e-5 {
            return degenerate;
        }
        let r = r / norm;

        let mut v1 = 0.0;
        let mut v2 = 1.0;
        let mut iterations = 0;
        while iterations < self.params.hoop_max_iter {
            let v = (v1 + v2) / 2.0;
            let p = self.point(u, v, right);
            let radial = normalize_or_zero(&Vector3::new(0.0, p.y, p.z), 1.0e-12);
            let sine = r.y * radial.z - r.z * radial.y;
            iterations += 1;

            if sine.abs() <= self.params.hoop_tolerance {
                return HoopSearch {
                    v,
                    iterations,
                    converged: true,
                };
            }

            // The sense of rotation from the top to the bottom flips on the mirrored side
            if (sine > 0.0) == right {
                v1 = v;
            } else {
                v2 = v;
            }
        }

        HoopSearch {
            v: (v1 + v2) / 2.0,
            iterations,
            converged: false,
        }
    }

    /// The hoop parameter along `direction` at `u`, see `hoop_search`.
    pub fn hoop_parameter(&self, u: f64, direction: &Vector3, right: bool) -> f64 {
        self.hoop_search(u, direction, right).v
    }

    /// Returns true if the point (x, z) on the symmetry plane lies strictly inside the section of
    /// the body at x.
    pub fn is_in_body(&self, x: f64, z: f64) -> bool {
        let u = self.longitudinal_parameter(x);
        if u <= 0.0 || u >= 1.0 {
            return false;
        }
        self.point(u, 1.0, true).z < z && z < self.point(u, 0.0, true).z
    }

    /// Approximate length of the full hoop (both halves) at position `x` of the smooth surface,
    /// from chords between evenly spaced hoop parameters. Flat-panel bodies return 0.
    pub fn section_arc_length(&self, x: f64) -> f64 {
        match self.kind {
            BodyKind::FlatPanels => 0.0,
            BodyKind::Smooth => {
                let u = self.surface.u_at_x(x);
                2.0 * self.hoop_arc(u)
            }
        }
    }

    /// Length of the right half of the section at `u` measured in the y-z plane.
    fn hoop_arc(&self, u: f64) -> f64 {
        let n = self.params.arc_samples.max(1);
        let mut length = 0.0;
        let mut last = self.surface.point(u, 0.0);
        for i in 1..=n {
            let p = self.surface.point(u, i as f64 / n as f64);
            length += (p.y - last.y).hypot(p.z - last.z);
            last = p;
        }
        length
    }

    /// The longitudinal parameters of the smooth mesh stations, `nx_panels + 1` values from 0 to
    /// 1 distributed by the bunching parameter.
    pub fn x_panel_positions(&self) -> Vec<f64> {
        let a = (self.bunch + 1.0) * 0.48;
        let a = 1.0 / (1.0 - a);
        let norm = 1.0 / (1.0 + (0.5 * a).exp());

        (0..=self.nx_panels)
            .map(|i| {
                let x = i as f64 / self.nx_panels as f64;
                let y = 1.0 / (1.0 + ((0.5 - x) * a).exp());
                0.5 - ((0.5 - y) / (0.5 - norm)) / 2.0
            })
            .collect()
    }

    /// The quadrilateral panel mesh of the body, built on first use after every change to the
    /// geometry and cached until the next one.
    pub fn panel_mesh(&self) -> &PanelMesh {
        self.panels.get_or_init(|| PanelMesh::from_body(self))
    }

    pub(crate) fn invalidate(&mut self) {
        self.panels.take();
    }

    pub(crate) fn set_panel_tables(&mut self, x_panels: Vec<usize>, h_panels: Vec<usize>) {
        let mut x_panels = x_panels;
        let mut h_panels = h_panels;
        x_panels.resize(self.frame_count(), 1);
        h_panels.resize(self.side_line_count(), 1);
        self.x_panels = x_panels.into_iter().map(|n| n.max(1)).collect();
        self.h_panels = h_panels.into_iter().map(|n| n.max(1)).collect();
        self.invalidate();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    pub(crate) fn square_tube(kind: BodyKind) -> Body {
        let section = [(0.0, 0.5), (0.5, 0.5), (0.5, -0.5), (0.0, -0.5)];
        let frames = vec![Frame::from_yz(0.0, &section), Frame::from_yz(1.0, &section)];
        Body::from_frames("tube", kind, frames).unwrap()
    }

    pub(crate) fn round_tube() -> Body {
        let section = [(0.0, 1.0), (1.0, 1.0), (1.0, -1.0), (0.0, -1.0)];
        let frames = (0..5)
            .map(|i| Frame::from_yz(i as f64, &section))
            .collect();
        Body::from_frames("round", BodyKind::Smooth, frames).unwrap()
    }

    #[test]
    fn default_template() {
        let body = Body::default();
        assert_eq!(body.frame_count(), 7);
        assert_eq!(body.side_line_count(), 5);
        assert_eq!(body.kind(), BodyKind::Smooth);
        assert_relative_eq!(body.length(), 0.962, epsilon = 1e-12);
        assert_relative_eq!(body.leading_point(), Point3::new(-0.243, 0.0, -0.0172));
    }

    #[test]
    fn mirrored_side_negates_y_only() {
        let mut rng = rand::rng();
        for kind in [BodyKind::Smooth, BodyKind::FlatPanels] {
            let mut body = Body::default();
            body.set_kind(kind);
            for _ in 0..50 {
                let u = rng.random_range(0.0..=1.0);
                let v = rng.random_range(0.0..=1.0);
                let r = body.point(u, v, true);
                let l = body.point(u, v, false);
                assert_eq!(l, Point3::new(r.x, -r.y, r.z));
            }
        }
    }

    #[test]
    fn longitudinal_parameter_inverts_point() {
        let body = Body::default();
        for i in 1..20 {
            let u = i as f64 / 20.0;
            let x = body.point(u, 0.4, true).x;
            assert_relative_eq!(body.longitudinal_parameter(x), u, epsilon = 1e-5);
        }
    }

    #[test]
    fn hoop_search_finds_side() {
        let body = round_tube();
        let search = body.hoop_search(0.5, &Vector3::new(0.0, 1.0, 0.0), true);
        assert!(search.converged);
        assert_relative_eq!(search.v, 0.5, epsilon = 1e-3);

        let left = body.hoop_search(0.5, &Vector3::new(0.0, -1.0, 0.0), false);
        assert!(left.converged);
        assert_relative_eq!(left.v, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn hoop_search_degenerate_inputs() {
        let body = round_tube();
        assert_eq!(body.hoop_parameter(0.0, &Vector3::y(), true), 0.0);
        assert_eq!(body.hoop_parameter(1.0, &Vector3::y(), true), 0.0);
        assert_eq!(body.hoop_parameter(0.5, &Vector3::new(0.0, 1e-6, 0.0), true), 0.0);
    }

    #[test]
    fn hoop_search_reports_iteration_limit() {
        let mut body = round_tube();
        body.params.hoop_max_iter = 1;
        let search = body.hoop_search(0.5, &Vector3::new(0.0, 1.0, 1.0), true);
        assert!(!search.converged);
        assert_eq!(search.iterations, 1);
        // the first midpoint points along +y, so the bracket closes on the upper half
        assert_relative_eq!(search.v, 0.25);

        body.params.hoop_max_iter = 100;
        let search = body.hoop_search(0.5, &Vector3::new(0.0, 1.0, 1.0), true);
        assert!(search.converged);
        assert!(search.v > 0.0 && search.v < 0.5);
    }

    #[test]
    fn inside_checks() {
        let body = round_tube();
        assert!(body.is_in_body(2.0, 0.0));
        assert!(!body.is_in_body(-0.5, 0.0));
        assert!(!body.is_in_body(4.5, 0.0));
        assert!(!body.is_in_body(2.0, 1.5));

        let flat = square_tube(BodyKind::FlatPanels);
        assert!(flat.is_in_body(0.5, 0.0));
        assert!(!flat.is_in_body(0.5, -0.6));
    }

    #[test]
    fn arc_length_of_flat_body_is_zero() {
        let flat = square_tube(BodyKind::FlatPanels);
        assert_eq!(flat.section_arc_length(0.5), 0.0);

        let smooth = round_tube();
        let arc = smooth.section_arc_length(2.0);
        // the section lies inside the 2 x 2 control polygon and spans its height
        assert!(arc > 4.0 && arc < 8.0);
    }

    #[test]
    fn bunched_positions() {
        let mut body = Body::default();
        body.set_mesh_resolution(10, 5);
        body.set_bunch(0.5);
        let pos = body.x_panel_positions();
        assert_eq!(pos.len(), 11);
        assert_relative_eq!(pos[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos[10], 1.0, epsilon = 1e-12);
        for i in 0..=10 {
            assert_relative_eq!(pos[i] + pos[10 - i], 1.0, epsilon = 1e-12);
        }
        assert!(pos.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn panel_cache_invalidated() {
        let mut body = square_tube(BodyKind::FlatPanels);
        assert_eq!(body.panel_mesh().len(), 2 * 3);
        body.set_h_panels(0, 2).unwrap();
        assert_eq!(body.panel_mesh().len(), 2 * 4);
        assert!(body.set_x_panels(5, 2).is_err());
    }

    #[test]
    fn json_round_trip() {
        let mut body = Body::default();
        body.point_masses
            .push(PointMass::new(0.1, Point3::new(0.1, 0.0, 0.0), "battery"));
        let text = serde_json::to_string(&body).unwrap();
        let back: Body = serde_json::from_str(&text).unwrap();
        assert_eq!(back.frames(), body.frames());
        assert_eq!(back.point_masses, body.point_masses);
        assert_relative_eq!(back.point(0.3, 0.3, true), body.point(0.3, 0.3, true));
    }

    #[test]
    fn json_with_mismatched_frames_rejected() {
        let body = round_tube();
        let mut value = serde_json::to_value(&body).unwrap();
        value
            .pointer_mut("/surface/frames/2/points")
            .and_then(|p| p.as_array_mut())
            .unwrap()
            .push(serde_json::json!([2.0, 0.5, 0.0]));
        assert!(serde_json::from_value::<Body>(value).is_err());
    }

    #[test]
    fn json_with_coincident_frames_rejected() {
        let body = round_tube();
        let mut value = serde_json::to_value(&body).unwrap();
        let frames = value
            .pointer_mut("/surface/frames")
            .and_then(|f| f.as_array_mut())
            .unwrap();
        let copy = frames[1].clone();
        frames.push(copy);
        assert!(serde_json::from_value::<Body>(value).is_err());
    }
}
