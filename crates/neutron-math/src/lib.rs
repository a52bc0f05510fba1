//! Mesh, interpolation and linear-solver primitives for the neutron
//! transport workspace.

pub mod cg;
pub mod gmres;
pub mod interp;
pub mod linalg;
pub mod mesh;
pub mod sparse;
