//! The interpolated body surface. A `NurbsSurface` owns the frames of a body together with the
//! interpolation degrees, edge weights and the derived knot vectors, and evaluates positions on
//! the right half of the body either as a rational B-spline surface or as bilinear flat panels.
//!
//! The knot vectors depend only on the number of frames, the number of side-lines and the
//! degrees, and they are re-derived inside every operation that changes one of those. Control
//! point coordinates may change freely without touching the knots.

pub mod basis;
mod frame;

use crate::common::points::bilinear;
use crate::errors::BodyError;
use crate::Point3;
use basis::{basis_values, clamped_knots, effective_degree};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use frame::Frame;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SurfaceData", into = "SurfaceData")]
pub struct NurbsSurface {
    frames: Vec<Frame>,
    u_degree: usize,
    v_degree: usize,
    edge_weight_u: f64,
    edge_weight_v: f64,
    u_knots: Vec<f64>,
    v_knots: Vec<f64>,
}

/// The persisted part of a surface; knots are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SurfaceData {
    frames: Vec<Frame>,
    u_degree: usize,
    v_degree: usize,
    edge_weight_u: f64,
    edge_weight_v: f64,
}

impl TryFrom<SurfaceData> for NurbsSurface {
    type Error = BodyError;

    fn try_from(data: SurfaceData) -> Result<Self, Self::Error> {
        let mut frames = data.frames;
        sort_frames(&mut frames);
        check_frames(&frames)?;

        let mut surface = NurbsSurface {
            frames,
            u_degree: data.u_degree.max(1),
            v_degree: data.v_degree.max(1),
            edge_weight_u: data.edge_weight_u,
            edge_weight_v: data.edge_weight_v,
            u_knots: Vec::new(),
            v_knots: Vec::new(),
        };
        surface.set_knots();
        Ok(surface)
    }
}

impl From<NurbsSurface> for SurfaceData {
    fn from(surface: NurbsSurface) -> Self {
        SurfaceData {
            frames: surface.frames,
            u_degree: surface.u_degree,
            v_degree: surface.v_degree,
            edge_weight_u: surface.edge_weight_u,
            edge_weight_v: surface.edge_weight_v,
        }
    }
}

impl NurbsSurface {
    /// Create a new surface from a list of frames. The frames are sorted by position, no two
    /// frames may share a position, and every frame must have the same number of control points
    /// as the first one.
    ///
    /// # Arguments
    ///
    /// * `frames`: at least two frames with at least two control points each
    /// * `u_degree`: the requested degree in the longitudinal direction
    /// * `v_degree`: the requested degree in the hoop direction
    ///
    /// returns: Result<NurbsSurface, BodyError>
    pub fn try_new(
        mut frames: Vec<Frame>,
        u_degree: usize,
        v_degree: usize,
    ) -> Result<Self, BodyError> {
        sort_frames(&mut frames);
        check_frames(&frames)?;
        Ok(Self::from_checked(frames, u_degree, v_degree))
    }

    /// Build a surface from frames already known to share a side-line count.
    pub(crate) fn from_checked(mut frames: Vec<Frame>, u_degree: usize, v_degree: usize) -> Self {
        sort_frames(&mut frames);

        let mut surface = Self {
            frames,
            u_degree: u_degree.max(1),
            v_degree: v_degree.max(1),
            edge_weight_u: 1.0,
            edge_weight_v: 1.0,
            u_knots: Vec::new(),
            v_knots: Vec::new(),
        };
        surface.set_knots();
        surface
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The number of control points in every frame.
    pub fn side_line_count(&self) -> usize {
        self.frames.first().map(|f| f.len()).unwrap_or(0)
    }

    pub fn u_degree(&self) -> usize {
        self.u_degree
    }

    pub fn v_degree(&self) -> usize {
        self.v_degree
    }

    pub fn edge_weights(&self) -> (f64, f64) {
        (self.edge_weight_u, self.edge_weight_v)
    }

    pub fn u_knots(&self) -> &[f64] {
        &self.u_knots
    }

    pub fn v_knots(&self) -> &[f64] {
        &self.v_knots
    }

    /// The position of the first frame, the nose of the body.
    pub fn first_position(&self) -> f64 {
        self.frames.first().map(|f| f.position()).unwrap_or(0.0)
    }

    /// The position of the last frame, the tail of the body.
    pub fn last_position(&self) -> f64 {
        self.frames.last().map(|f| f.position()).unwrap_or(0.0)
    }

    /// Evaluate the rational B-spline surface on the right side of the body.
    ///
    /// # Arguments
    ///
    /// * `u`: longitudinal parameter in [0, 1], nose to tail
    /// * `v`: hoop parameter in [0, 1], top to bottom
    ///
    /// returns: OPoint<f64, Const<3>>
    pub fn point(&self, u: f64, v: f64) -> Point3 {
        let nu = self.frame_count();
        let nv = self.side_line_count();
        if nu == 0 || nv == 0 {
            return Point3::origin();
        }

        let bu = basis_values(&self.u_knots, self.effective_u_degree(), nu, u);
        let bv = basis_values(&self.v_knots, self.effective_v_degree(), nv, v);

        let mut sum = crate::Vector3::zeros();
        let mut weight = 0.0;
        for (iu, frame) in self.frames.iter().enumerate() {
            if bu[iu] == 0.0 {
                continue;
            }
            let wu = bu[iu] * self.u_weight(iu);
            for (jv, p) in frame.points().iter().enumerate() {
                let c = wu * bv[jv] * self.v_weight(jv);
                sum += p.coords * c;
                weight += c;
            }
        }

        if weight.abs() > 0.0 {
            Point3::from(sum / weight)
        } else {
            Point3::from(sum)
        }
    }

    /// Evaluate the flat-panel interpretation of the frames: the longitudinal parameter is spread
    /// uniformly over the frame intervals and the hoop parameter uniformly over the side-line
    /// intervals, with bilinear interpolation inside each cell.
    pub fn flat_point(&self, u: f64, v: f64) -> Point3 {
        let nu = self.frame_count();
        let nv = self.side_line_count();
        if nu < 2 || nv < 2 {
            return self
                .frames
                .first()
                .and_then(|f| f.point(0))
                .copied()
                .unwrap_or_else(Point3::origin);
        }

        let (i, f) = cell(u, nu - 1);
        let (j, g) = cell(v, nv - 1);
        let a = &self.frames[i];
        let b = &self.frames[i + 1];
        bilinear(
            &a.points()[j],
            &b.points()[j],
            &a.points()[j + 1],
            &b.points()[j + 1],
            f,
            g,
        )
    }

    /// Invert the longitudinal position of the smooth surface by bisection on the top line. The
    /// mapping is assumed monotonic, which holds when the frames are in increasing order.
    pub fn u_at_x(&self, x: f64) -> f64 {
        let first = self.first_position();
        let last = self.last_position();
        if x <= first {
            return 0.0;
        }
        if x >= last {
            return 1.0;
        }
        if (last - first).abs() < 1.0e-7 {
            return 0.0;
        }

        let mut u1: f64 = 0.0;
        let mut u2 = 1.0;
        let mut iter = 0;
        while (u2 - u1).abs() > 1.0e-6 && iter < 200 {
            let u = (u1 + u2) / 2.0;
            if self.point(u, 0.0).x > x {
                u2 = u;
            } else {
                u1 = u;
            }
            iter += 1;
        }
        (u1 + u2) / 2.0
    }

    /// Exact inverse of the longitudinal position of the flat-panel interpretation.
    pub fn flat_u_at_x(&self, x: f64) -> f64 {
        let n = self.frame_count();
        let first = self.first_position();
        let last = self.last_position();
        if n < 2 || x <= first {
            return 0.0;
        }
        if x >= last {
            return 1.0;
        }

        for (i, pair) in self.frames.windows(2).enumerate() {
            let x0 = pair[0].position();
            let x1 = pair[1].position();
            if x0 <= x && x < x1 {
                let f = (x - x0) / (x1 - x0);
                return (i as f64 + f) / (n - 1) as f64;
            }
        }
        1.0
    }

    /// Sample the smooth surface on a regular grid. The result has one row per value of `us`,
    /// each row holding one point per value of `vs`. Rows are computed in parallel and returned
    /// in order.
    pub fn sample_grid(&self, us: &[f64], vs: &[f64]) -> Vec<Vec<Point3>> {
        us.par_iter()
            .map(|&u| vs.iter().map(|&v| self.point(u, v)).collect())
            .collect()
    }

    /// Sample the flat-panel interpretation at explicit cell stations. Each station is a cell
    /// index and a fraction within the cell, longitudinally over frame intervals and in the hoop
    /// direction over side-line intervals.
    pub fn sample_flat_grid(
        &self,
        long_stations: &[(usize, f64)],
        hoop_stations: &[(usize, f64)],
    ) -> Vec<Vec<Point3>> {
        long_stations
            .par_iter()
            .map(|&(i, f)| {
                let a = &self.frames[i];
                let b = &self.frames[i + 1];
                hoop_stations
                    .iter()
                    .map(|&(j, g)| {
                        bilinear(
                            &a.points()[j],
                            &b.points()[j],
                            &a.points()[j + 1],
                            &b.points()[j + 1],
                            f,
                            g,
                        )
                    })
                    .collect()
            })
            .collect()
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub(crate) fn insert_frame(&mut self, index: usize, frame: Frame) {
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
        self.set_knots();
    }

    pub(crate) fn remove_frame(&mut self, index: usize) {
        if index < self.frames.len() {
            self.frames.remove(index);
        }
        self.set_knots();
    }

    /// Insert `point` into one frame at `index`, and a midpoint at the same index in every other
    /// frame so that all frames keep the same number of side-lines.
    pub(crate) fn insert_side_line(&mut self, frame_index: usize, index: usize, point: Point3) {
        for (i, frame) in self.frames.iter_mut().enumerate() {
            if i == frame_index {
                frame.insert_point(index, point);
            } else {
                frame.insert_midpoint(index);
            }
        }
        self.set_knots();
    }

    pub(crate) fn remove_side_line(&mut self, index: usize) {
        for frame in self.frames.iter_mut() {
            frame.remove_point(index);
        }
        self.set_knots();
    }

    pub(crate) fn set_degrees(&mut self, u_degree: usize, v_degree: usize) {
        self.u_degree = u_degree.max(1);
        self.v_degree = v_degree.max(1);
        self.set_knots();
    }

    pub(crate) fn set_edge_weights(&mut self, u: f64, v: f64) {
        self.edge_weight_u = u;
        self.edge_weight_v = v;
    }

    fn effective_u_degree(&self) -> usize {
        effective_degree(self.u_degree, self.frame_count())
    }

    fn effective_v_degree(&self) -> usize {
        effective_degree(self.v_degree, self.side_line_count())
    }

    fn u_weight(&self, iu: usize) -> f64 {
        if iu == 0 || iu + 1 == self.frame_count() {
            self.edge_weight_u
        } else {
            1.0
        }
    }

    fn v_weight(&self, jv: usize) -> f64 {
        if jv == 0 || jv + 1 == self.side_line_count() {
            self.edge_weight_v
        } else {
            1.0
        }
    }

    fn set_knots(&mut self) {
        let nu = self.frame_count();
        let nv = self.side_line_count();
        self.u_knots = clamped_knots(nu, self.effective_u_degree());
        self.v_knots = clamped_knots(nv, self.effective_v_degree());
    }
}

fn sort_frames(frames: &mut [Frame]) {
    frames.sort_by(|a, b| a.position().total_cmp(&b.position()));
}

/// Validate that a sorted frame list can form a surface.
pub(crate) fn check_frames(frames: &[Frame]) -> Result<(), BodyError> {
    if frames.len() < 2 {
        return Err(BodyError::NotEnoughFrames);
    }
    let expected = frames[0].len();
    if expected < 2 {
        return Err(BodyError::NotEnoughSideLines);
    }
    for (i, f) in frames.iter().enumerate().skip(1) {
        if f.len() != expected {
            return Err(BodyError::MismatchedSideLines {
                frame: i,
                expected,
                found: f.len(),
            });
        }
    }
    for (i, pair) in frames.windows(2).enumerate() {
        if pair[0].position().partial_cmp(&pair[1].position()) != Some(Ordering::Less) {
            return Err(BodyError::FramesOutOfOrder { index: i + 1 });
        }
    }
    Ok(())
}

/// Locate a parameter in [0, 1] spread over `intervals` equal cells, returning the cell index and
/// the fraction within it.
fn cell(t: f64, intervals: usize) -> (usize, f64) {
    let s = t.clamp(0.0, 1.0) * intervals as f64;
    let i = (s.floor() as usize).min(intervals - 1);
    (i, s - i as f64)
}
