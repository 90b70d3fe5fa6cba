//! Quadrilateral panel meshes derived from a body surface.

use super::{Body, BodyKind};
use crate::common::linear_space;
use crate::common::points::{mean_point, mirror_y, mirror_y_vec, normalize_or_zero};
use crate::{Point3, Vector3};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A planar quadrilateral approximation of a patch of the body surface. The corners are stored in
/// the order leading-a, trailing-a, trailing-b, leading-b, where leading/trailing refer to the
/// nose-side and tail-side stations and a/b to the upper and lower hoop stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub corners: [Point3; 4],

    /// Unit outward normal, or the zero vector for a collapsed panel
    pub normal: Vector3,
    pub area: f64,

    /// The mean of the four corners
    pub collocation: Point3,
    pub right: bool,
}

impl Panel {
    pub fn from_corners(la: Point3, ta: Point3, tb: Point3, lb: Point3, right: bool) -> Self {
        let n = (tb - la).cross(&(lb - ta));
        let corners = [la, ta, tb, lb];
        Self {
            corners,
            normal: normalize_or_zero(&n, 1.0e-14),
            area: n.norm() / 2.0,
            collocation: mean_point(&corners),
            right,
        }
    }

    /// The reflection of this panel across the x-z plane.
    pub fn mirrored(&self) -> Self {
        Self {
            corners: self.corners.map(|c| mirror_y(&c)),
            normal: mirror_y_vec(&self.normal),
            area: self.area,
            collocation: mirror_y(&self.collocation),
            right: !self.right,
        }
    }
}

/// The panels of both halves of a body. The right half comes first, ordered with the longitudinal
/// index as the outer loop and the hoop index as the inner loop, followed by the left half
/// mirrored in the same order. Externally computed per-panel values such as pressure
/// coefficients are indexed in this order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelMesh {
    panels: Vec<Panel>,
    nx: usize,
    nh: usize,
}

impl PanelMesh {
    /// Build the mesh from a grid of right-side surface points, one row per longitudinal station
    /// and one column per hoop station.
    pub fn from_grid(grid: &[Vec<Point3>]) -> Self {
        let nx = grid.len().saturating_sub(1);
        let nh = grid.first().map(|r| r.len()).unwrap_or(0).saturating_sub(1);

        let mut panels = Vec::with_capacity(2 * nx * nh);
        for (lead, trail) in grid.iter().tuple_windows() {
            for ((la, ta), (lb, tb)) in lead.iter().zip(trail.iter()).tuple_windows() {
                panels.push(Panel::from_corners(*la, *ta, *tb, *lb, true));
            }
        }

        let left = panels.iter().map(|p| p.mirrored()).collect_vec();
        panels.extend(left);

        Self { panels, nx, nh }
    }

    pub(crate) fn from_body(body: &Body) -> Self {
        let surface = body.surface();
        let grid = match body.kind() {
            BodyKind::FlatPanels => {
                let long = flat_stations(body.x_panels(), surface.frame_count() - 1);
                let hoop = flat_stations(body.h_panels(), surface.side_line_count() - 1);
                surface.sample_flat_grid(&long, &hoop)
            }
            BodyKind::Smooth => {
                let (_, nh) = body.mesh_resolution();
                let us = body.x_panel_positions();
                let vs = linear_space(0.0, 1.0, nh + 1);
                surface.sample_grid(&us, &vs)
            }
        };
        Self::from_grid(&grid)
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// The panels of one half of the body.
    pub fn half(&self, right: bool) -> &[Panel] {
        let n = self.nx * self.nh;
        if right {
            &self.panels[..n]
        } else {
            &self.panels[n..]
        }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// The number of longitudinal and hoop divisions of each half.
    pub fn divisions(&self) -> (usize, usize) {
        (self.nx, self.nh)
    }

    pub fn area(&self) -> f64 {
        self.panels.iter().map(|p| p.area).sum()
    }
}

/// Expand per-interval panel counts into explicit (interval, fraction) stations running from the
/// start of the first interval to the end of the last one. Counts of zero are treated as one.
fn flat_stations(counts: &[usize], intervals: usize) -> Vec<(usize, f64)> {
    let mut stations = Vec::new();
    for i in 0..intervals {
        let n = counts.get(i).copied().unwrap_or(1).max(1);
        stations.extend((0..n).map(|j| (i, j as f64 / n as f64)));
    }
    if intervals > 0 {
        stations.push((intervals - 1, 1.0));
    }
    stations
}
