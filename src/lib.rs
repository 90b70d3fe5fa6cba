//! Parametric geometry engine for fuselage-like bodies. A body is described by a sequence of
//! cross-section frames which are interpolated either as flat panels or as a smooth rational
//! B-spline surface, and from which intersections, mass properties, aerodynamic force sums and
//! mesh/archive representations are derived.

pub mod body;
pub mod common;
pub mod errors;
pub mod geom3;
pub mod io;
pub mod surface;

use std::error::Error;

pub type Point3 = parry3d_f64::na::Point3<f64>;
pub type Vector3 = parry3d_f64::na::Vector3<f64>;
pub type UnitVec3 = parry3d_f64::na::Unit<Vector3>;

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

pub use body::{
    AeroForces, Body, BodyKind, BodyParams, FrameTarget, HoopSearch, MassProperties, Panel,
    PanelMesh, PointMass,
};
pub use errors::BodyError;
pub use surface::{Frame, NurbsSurface};
