//! Boolean operations (union, difference, intersection) on closed polygon
//! soups, implemented with binary space partitioning trees.
#![forbid(unsafe_code)]
#![warn(unused)]

pub mod bsp;
pub mod config;
pub mod csg;
pub mod errors;
pub mod float_types;
pub mod mesh;
pub mod plane;
pub mod polygon;
pub mod vertex;

pub use config::CsgConfig;
pub use csg::{BooleanOp, CSG};
pub use errors::CsgError;
pub use mesh::TriangleMesh;
pub use vertex::{CsgVertex, Vertex};
