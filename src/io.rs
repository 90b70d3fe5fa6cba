//! Reading and writing bodies: binary STL meshes, the text definition format, surface point
//! listings and the versioned binary archive.

pub mod archive;
pub mod stl;
pub mod text;
