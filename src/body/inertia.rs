//! Shell area, centroid and inertia of a body, with point masses combined by the parallel axis
//! theorem.

use super::{Body, BodyKind};
use crate::common::points::{mean_point, mirror_y};
use crate::{Point3, Vector3};
use parry3d_f64::na::Matrix3;
use serde::{Deserialize, Serialize};

/// Mass, center of gravity and inertia about the center of gravity, in body axes. The products
/// of inertia Ixy and Iyz vanish by left-right symmetry. `ixz` is the off-diagonal entry of the
/// inertia tensor, so it accumulates `-m * dx * dz`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f64,
    pub cog: Point3,
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
    pub ixz: f64,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 0.0,
            cog: Point3::origin(),
            ixx: 0.0,
            iyy: 0.0,
            izz: 0.0,
            ixz: 0.0,
        }
    }
}

impl MassProperties {
    /// The full inertia tensor about the center of gravity.
    pub fn tensor(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, 0.0, self.ixz, //
            0.0, self.iyy, 0.0, //
            self.ixz, 0.0, self.izz,
        )
    }

    fn add_mass(&mut self, mass: f64, at: &Point3) {
        let d = at - self.cog;
        self.ixx += mass * (d.y * d.y + d.z * d.z);
        self.iyy += mass * (d.x * d.x + d.z * d.z);
        self.izz += mass * (d.x * d.x + d.y * d.y);
        self.ixz -= mass * d.x * d.z;
    }
}

/// A patch of the shell treated as a concentrated area at its center.
struct Strip {
    area: f64,
    center: Point3,
}

impl Body {
    /// The total area of the skin of both halves of the body.
    pub fn wetted_area(&self) -> f64 {
        match self.kind {
            BodyKind::FlatPanels => {
                let mut area = 0.0;
                for (f0, f1) in self.frames().iter().zip(self.frames().iter().skip(1)) {
                    for k in 0..self.side_line_count() - 1 {
                        let la = f0.points()[k];
                        let lb = f0.points()[k + 1];
                        let ta = f1.points()[k];
                        let tb = f1.points()[k + 1];
                        area += (tb - la).cross(&(lb - ta)).norm() / 2.0;
                    }
                }
                2.0 * area
            }
            BodyKind::Smooth => {
                let (dl, xs) = self.stations();
                xs.windows(2)
                    .map(|w| {
                        dl * (self.section_arc_length(w[0]) + self.section_arc_length(w[1])) / 2.0
                    })
                    .sum()
            }
        }
    }

    /// Axial integration stations spanning the body and their spacing.
    fn stations(&self) -> (f64, Vec<f64>) {
        let n = self.params.inertia_stations.max(2);
        let x0 = self.frame_position(0);
        let dl = self.length() / (n - 1) as f64;
        (dl, (0..n).map(|j| x0 + j as f64 * dl).collect())
    }

    /// Subdivide the skin of both halves into strips.
    fn strips(&self) -> Vec<Strip> {
        match self.kind {
            BodyKind::FlatPanels => self
                .panel_mesh()
                .panels()
                .iter()
                .map(|p| Strip {
                    area: p.area,
                    center: p.collocation,
                })
                .collect(),
            BodyKind::Smooth => {
                let (dl, xs) = self.stations();
                let n = self.params.arc_samples.max(1);
                let sections: Vec<Vec<Point3>> = xs
                    .iter()
                    .map(|&x| {
                        let u = self.surface.u_at_x(x);
                        (0..=n)
                            .map(|l| self.surface.point(u, l as f64 / n as f64))
                            .collect()
                    })
                    .collect();

                let mut right = Vec::new();
                for pair in sections.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    for l in 0..n {
                        let chord_a = (a[l + 1].y - a[l].y).hypot(a[l + 1].z - a[l].z);
                        let chord_b = (b[l + 1].y - b[l].y).hypot(b[l + 1].z - b[l].z);
                        right.push(Strip {
                            area: dl * (chord_a + chord_b) / 2.0,
                            center: mean_point(&[a[l], a[l + 1], b[l], b[l + 1]]),
                        });
                    }
                }

                let left: Vec<Strip> = right
                    .iter()
                    .map(|s| Strip {
                        area: s.area,
                        center: mirror_y(&s.center),
                    })
                    .collect();
                right.extend(left);
                right
            }
        }
    }

    /// The areal density of the shell, its mass over the wetted area. On twisted flat panels the
    /// subdivided strips cover slightly more than the wetted area.
    pub(crate) fn shell_density(&self) -> f64 {
        let area = self.wetted_area();
        if area > self.params.mass_epsilon {
            self.shell_mass / area
        } else {
            0.0
        }
    }

    /// Mass properties of the shell alone, with the shell mass spread uniformly over the wetted
    /// area. The centroid is computed first, and the inertia is then accumulated about it.
    pub fn shell_inertia(&self) -> MassProperties {
        let eps = self.params.mass_epsilon;
        let strips = self.strips();
        let rho = self.shell_density();

        let mut props = MassProperties {
            mass: self.shell_mass,
            ..MassProperties::default()
        };

        if self.shell_mass > eps {
            let mut moment = Vector3::zeros();
            for s in strips.iter() {
                moment += s.center.coords * (s.area * rho);
            }
            props.cog = Point3::from(moment / self.shell_mass);
        }

        for s in strips.iter() {
            props.add_mass(s.area * rho, &s.center);
        }
        props
    }

    /// Compute the mass properties of the shell and the point masses together, store them on the
    /// body and return them. The shell inertia is moved from the shell centroid to the combined
    /// center of gravity and the point masses are added about it.
    pub fn compute_inertia(&mut self) -> MassProperties {
        let shell = self.shell_inertia();
        let total = self.total_mass();

        let mut moment = shell.cog.coords * shell.mass;
        for pm in self.point_masses.iter() {
            moment += pm.position.coords * pm.mass;
        }
        let cog = if total > self.params.mass_epsilon {
            Point3::from(moment / total)
        } else {
            Point3::origin()
        };

        let mut props = MassProperties {
            mass: total,
            cog,
            ixx: shell.ixx,
            iyy: shell.iyy,
            izz: shell.izz,
            ixz: shell.ixz,
        };
        props.add_mass(shell.mass, &shell.cog);
        for pm in self.point_masses.iter() {
            props.add_mass(pm.mass, &pm.position);
        }

        self.inertia = props;
        props
    }

    /// The mass properties from the last call to `compute_inertia`.
    pub fn inertia(&self) -> &MassProperties {
        &self.inertia
    }

    /// Shell mass plus every point mass.
    pub fn total_mass(&self) -> f64 {
        self.shell_mass + self.point_masses.iter().map(|p| p.mass).sum::<f64>()
    }
}
