//! Cutting planes: point orientation and polygon splitting.

use crate::float_types::Real;
use crate::polygon::Polygon;
use crate::vertex::CsgVertex;
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;

// Classification of a point or polygon against a plane. Polygon types are the
// bitwise OR of their vertex types, so FRONT | BACK == SPANNING.
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// The four output lists of [`Plane::split_polygon`]:
/// `(coplanar_front, coplanar_back, front, back)`.
pub type SplitPolygons<S, V> = (
    Vec<Polygon<S, V>>,
    Vec<Polygon<S, V>>,
    Vec<Polygon<S, V>>,
    Vec<Polygon<S, V>>,
);

/// A plane in 3D space defined by a unit normal and offset `w` (`normal · p = w`).
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// Create a plane from a normal and offset. The normal is normalized.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            w,
        }
    }

    /// Create a plane from three points, counter-clockwise as seen from the front.
    ///
    /// Collinear points give a NaN normal; callers filter degenerate input first.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Plane {
        let normal = (b - a).cross(&(c - a)).normalize();
        Plane {
            normal,
            w: normal.dot(&a.coords),
        }
    }

    /// Same geometric plane, opposite orientation.
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance from the plane, positive on the front side.
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point as `FRONT`, `BACK` or `COPLANAR` within `epsilon`.
    pub fn orient_point(&self, point: &Point3<Real>, epsilon: Real) -> i8 {
        let t = self.signed_distance(point);
        if t < -epsilon {
            BACK
        } else if t > epsilon {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Bitwise OR of the vertex classifications of `polygon`.
    pub fn classify_polygon<S: Clone, V: CsgVertex>(
        &self,
        polygon: &Polygon<S, V>,
        epsilon: Real,
    ) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(v.pos(), epsilon))
    }

    /// Split `polygon` by this plane if needed and sort it, or its fragments,
    /// into one of four lists.
    ///
    /// Coplanar polygons go to `coplanar_front` or `coplanar_back` depending on
    /// whether they face the same way as this plane. Polygons fully in front or
    /// behind are moved as-is. Spanning polygons are cut along the plane; each
    /// side with at least three vertices becomes a new polygon with the
    /// original metadata.
    pub fn split_polygon<S: Clone, V: CsgVertex>(
        &self,
        polygon: Polygon<S, V>,
        epsilon: Real,
    ) -> SplitPolygons<S, V> {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(v.pos(), epsilon))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon);
                } else {
                    coplanar_back.push(polygon);
                }
            }
            FRONT => front.push(polygon),
            BACK => back.push(polygon),
            _ => {
                let n = polygon.vertices.len();
                let mut f: Vec<V> = Vec::with_capacity(n + 1);
                let mut b: Vec<V> = Vec::with_capacity(n + 1);

                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let vi = &polygon.vertices[i];
                    let vj = &polygon.vertices[j];

                    if ti != BACK {
                        f.push(vi.clone());
                    }
                    if ti != FRONT {
                        b.push(vi.clone());
                    }

                    if (ti | tj) == SPANNING {
                        let denom = self.normal.dot(&(vj.pos() - vi.pos()));
                        let t = (self.w - self.normal.dot(&vi.pos().coords)) / denom;
                        let v = vi.interpolate(vj, t);
                        f.push(v.clone());
                        b.push(v);
                    }
                }

                if f.len() >= 3 {
                    front.push(Polygon::new(f, polygon.metadata.clone()));
                }
                if b.len() >= 3 {
                    back.push(Polygon::new(b, polygon.metadata));
                }
            }
        }

        (coplanar_front, coplanar_back, front, back)
    }
}
