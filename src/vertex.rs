//! Struct and functions for working with `Vertex`s from which `Polygon`s are composed.

use crate::float_types::Real;
use nalgebra::{Point3, Vector2, Vector3};
use std::fmt::Debug;

/// What the BSP kernel needs from a vertex.
///
/// Implement this for your own vertex type to carry extra attributes
/// (colors, weights, ...) through boolean operations; `interpolate` decides
/// how those attributes blend across a split.
pub trait CsgVertex: Clone + Debug {
    fn pos(&self) -> &Point3<Real>;

    /// Reverse orientation-dependent data. Called when a polygon is flipped.
    fn flip(&mut self);

    /// Blend `self` (`t = 0`) and `other` (`t = 1`). `t` may fall outside `[0, 1]`.
    fn interpolate(&self, other: &Self, t: Real) -> Self;
}

/// A vertex of a polygon, holding position, normal and texture coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    pub normal: Option<Vector3<Real>>,
    pub uv: Option<Vector2<Real>>,
}

impl Vertex {
    /// Create a new [`Vertex`] with a normal.
    ///
    /// * `pos`    – the position in model space
    /// * `normal` – copied verbatim, not normalized
    pub const fn new(pos: Point3<Real>, normal: Vector3<Real>) -> Self {
        Vertex {
            pos,
            normal: Some(normal),
            uv: None,
        }
    }

    /// A vertex with no attributes besides its position.
    pub const fn from_pos(pos: Point3<Real>) -> Self {
        Vertex {
            pos,
            normal: None,
            uv: None,
        }
    }

    pub const fn with_attributes(
        pos: Point3<Real>,
        normal: Option<Vector3<Real>>,
        uv: Option<Vector2<Real>>,
    ) -> Self {
        Vertex { pos, normal, uv }
    }

    /// Flip vertex normal
    pub fn flip(&mut self) {
        if let Some(n) = self.normal.as_mut() {
            *n = -*n;
        }
    }

    /// Return the linear interpolation between `self` (`t = 0`) and `other` (`t = 1`).
    ///
    /// Normals and uvs are interpolated only when both vertices carry them;
    /// otherwise the result has none.
    pub fn interpolate(&self, other: &Vertex, t: Real) -> Vertex {
        let pos = self.pos + (other.pos - self.pos) * t;
        let normal = match (&self.normal, &other.normal) {
            (Some(a), Some(b)) => Some(a.lerp(b, t)),
            _ => None,
        };
        let uv = match (&self.uv, &other.uv) {
            (Some(a), Some(b)) => Some(a.lerp(b, t)),
            _ => None,
        };
        Vertex { pos, normal, uv }
    }
}

impl CsgVertex for Vertex {
    fn pos(&self) -> &Point3<Real> {
        &self.pos
    }

    fn flip(&mut self) {
        Vertex::flip(self);
    }

    fn interpolate(&self, other: &Self, t: Real) -> Self {
        Vertex::interpolate(self, other, t)
    }
}
