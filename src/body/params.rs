use crate::Result;
use serde::{Deserialize, Serialize};

/// Numerical settings used by the body solvers and integrators. Every field has a default, so a
/// JSON document only needs to name the values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParams {
    /// Stop the hoop parameter bisection once the residual sine drops below this value
    pub hoop_tolerance: f64,

    /// Upper bound on hoop parameter bisection steps
    pub hoop_max_iter: usize,

    /// Stop the smooth-surface intersection once the step in the line parameter is below this
    pub intersect_tolerance: f64,

    /// Upper bound on smooth-surface intersection steps
    pub intersect_max_iter: usize,

    /// Cross products shorter than this count as a point lying on a panel edge
    pub edge_tolerance: f64,

    /// Number of axial stations used to integrate the smooth surface
    pub inertia_stations: usize,

    /// Number of chords used to approximate the hoop arc length of a section
    pub arc_samples: usize,

    /// Masses and areas below this value are treated as zero
    pub mass_epsilon: f64,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            hoop_tolerance: 1.0e-4,
            hoop_max_iter: 200,
            intersect_tolerance: 1.0e-5,
            intersect_max_iter: 20,
            edge_tolerance: 1.0e-4,
            inertia_stations: 20,
            arc_samples: 10,
            mass_epsilon: 1.0e-8,
        }
    }
}

impl BodyParams {
    /// Parse a set of parameters from a JSON string. Missing fields take their default values.
    ///
    /// # Examples
    ///
    /// ```
    /// use bodygeom::BodyParams;
    /// let params = BodyParams::from_json(r#"{"intersect_max_iter": 50}"#).unwrap();
    /// assert_eq!(params.intersect_max_iter, 50);
    /// assert_eq!(params.hoop_max_iter, 200);
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
