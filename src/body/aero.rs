use super::{Body, PanelMesh};
use crate::errors::BodyError;
use crate::{Point3, Result, Vector3};
use serde::{Deserialize, Serialize};

/// Resultant of a pressure coefficient field over a panel mesh. Forces and moments are
/// normalized by the dynamic pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AeroForces {
    /// Sum of the panel forces
    pub force: Vector3,

    /// Sum of the panel force components along the wind normal
    pub lift: f64,

    /// Sum of the panel collocation points weighted by their lift
    pub lift_moment: Vector3,

    /// `lift_moment / lift`, or the origin when the lift vanishes
    pub center_of_pressure: Point3,

    pub pitching: f64,
    pub rolling: f64,
    pub yawing: f64,
}

impl PanelMesh {
    /// Reduce per-panel pressure coefficients to a resultant force and moments about `cog`.
    ///
    /// # Arguments
    ///
    /// * `cp`: one pressure coefficient per panel, in mesh order
    /// * `alpha`: the angle of attack in degrees
    /// * `cog`: the point about which moments are taken
    ///
    /// returns: Result<AeroForces, Box<dyn Error, Global>>
    pub fn integrate_forces(&self, cp: &[f64], alpha: f64, cog: &Point3) -> Result<AeroForces> {
        if cp.len() != self.len() {
            return Err(Box::new(BodyError::PanelCountMismatch {
                expected: self.len(),
                found: cp.len(),
            }));
        }

        let (sina, cosa) = alpha.to_radians().sin_cos();
        let wind_normal = Vector3::new(-sina, 0.0, cosa);
        let wind_direction = Vector3::new(cosa, 0.0, sina);

        let mut force = Vector3::zeros();
        let mut lift = 0.0;
        let mut lift_moment = Vector3::zeros();
        let mut moment = Vector3::zeros();

        for (panel, c) in self.panels().iter().zip(cp.iter()) {
            let f = panel.normal * (-c * panel.area);
            let l = f.dot(&wind_normal);

            force += f;
            lift += l;
            lift_moment += panel.collocation.coords * l;
            moment += (panel.collocation - cog).cross(&f);
        }

        let center_of_pressure = if lift.abs() > 1.0e-12 {
            Point3::from(lift_moment / lift)
        } else {
            Point3::origin()
        };

        Ok(AeroForces {
            force,
            lift,
            lift_moment,
            center_of_pressure,
            pitching: moment.y,
            rolling: moment.dot(&wind_direction),
            yawing: moment.dot(&wind_normal),
        })
    }
}

impl Body {
    /// Integrate a pressure coefficient field over the panel mesh of this body, see
    /// `PanelMesh::integrate_forces`.
    pub fn integrate_forces(&self, cp: &[f64], alpha: f64, cog: &Point3) -> Result<AeroForces> {
        self.panel_mesh().integrate_forces(cp, alpha, cog)
    }
}
