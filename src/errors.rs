//! Error types for mesh import/export and solid-level transforms.
//!
//! The BSP kernel itself never fails: everything that can go wrong is caught
//! at the boundary, before polygons are built.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CsgError {
    /// Buffer shapes that cannot be read as a triangle soup.
    #[error("malformed mesh: {0}")]
    MalformedMesh(String),

    #[error("index {index} is out of range (vertex count = {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },

    /// A polyhedron face with fewer than three indices.
    #[error("face {face} has fewer than 3 vertices")]
    DegenerateFace { face: usize },

    #[error("transform matrix is not invertible")]
    NonInvertibleTransform,

    #[error("trimesh construction failed: {0}")]
    TriMesh(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
