mod plane3;

pub use plane3::Plane3;
