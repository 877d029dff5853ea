//! Convex planar polygons, the unit the BSP kernel works on.

use crate::float_types::Real;
use crate::plane::Plane;
use crate::vertex::{CsgVertex, Vertex};
use geo::{Coord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use nalgebra::Vector3;

// Triangle index lists for the polygon sizes splitting produces in practice.
const TRIANGLES_3: &[usize] = &[0, 1, 2];
const TRIANGLES_4: &[usize] = &[0, 1, 2, 0, 2, 3];
const TRIANGLES_5: &[usize] = &[0, 1, 2, 0, 2, 3, 0, 3, 4];
const TRIANGLES_6: &[usize] = &[0, 1, 2, 0, 2, 3, 0, 3, 5, 3, 4, 5];

/// A convex polygon: coplanar vertices wound counter-clockwise around
/// `plane.normal`, plus optional metadata carried through every split.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon<S: Clone, V: CsgVertex = Vertex> {
    pub vertices: Vec<V>,
    pub plane: Plane,
    pub metadata: Option<S>,
}

impl<S: Clone, V: CsgVertex> Polygon<S, V> {
    /// Create a polygon; its plane is taken from the first three vertices.
    ///
    /// # Panics
    /// If `vertices` has fewer than three entries.
    pub fn new(vertices: Vec<V>, metadata: Option<S>) -> Self {
        assert!(vertices.len() >= 3, "degenerate polygon");
        let plane = Plane::from_points(vertices[0].pos(), vertices[1].pos(), vertices[2].pos());
        Polygon {
            vertices,
            plane,
            metadata,
        }
    }

    /// Reverse winding, vertex orientation and plane.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.flip();
        }
        self.plane.flip();
    }

    /// True when the first three vertices do not span a plane: a repeated
    /// point, or an angle at the first vertex whose sine is within `epsilon`
    /// of zero. Independent of model scale.
    pub fn is_degenerate(&self, epsilon: Real) -> bool {
        let [a, b, c] = [
            self.vertices[0].pos(),
            self.vertices[1].pos(),
            self.vertices[2].pos(),
        ];
        let (ab, ac) = (b - a, c - a);
        ab.cross(&ac).norm() <= epsilon * ab.norm() * ac.norm()
    }

    /// Split the polygon into triangles.
    ///
    /// Sizes up to six use a fixed index table. Larger polygons are projected
    /// onto their plane and ear-clipped.
    pub fn triangulate(&self) -> Vec<[V; 3]> {
        let indices: Vec<usize> = match self.vertices.len() {
            3 => TRIANGLES_3.to_vec(),
            4 => TRIANGLES_4.to_vec(),
            5 => TRIANGLES_5.to_vec(),
            6 => TRIANGLES_6.to_vec(),
            n => {
                let ear = self.earcut_indices();
                if ear.len() == 3 * (n - 2) {
                    ear
                } else {
                    log::warn!("earcut failed on a {n}-gon ({} indices), using a fan", ear.len());
                    (1..n - 1).flat_map(|i| [0, i, i + 1]).collect()
                }
            }
        };

        indices
            .chunks_exact(3)
            .map(|t| {
                [
                    self.vertices[t[0]].clone(),
                    self.vertices[t[1]].clone(),
                    self.vertices[t[2]].clone(),
                ]
            })
            .collect()
    }

    /// Earcut on the polygon projected into an orthonormal basis of its plane.
    fn earcut_indices(&self) -> Vec<usize> {
        let n = self.plane.normal;
        let u = if n.x.abs() < 0.9 {
            Vector3::x().cross(&n).normalize()
        } else {
            Vector3::y().cross(&n).normalize()
        };
        let v = n.cross(&u);

        let coords: Vec<Coord<Real>> = self
            .vertices
            .iter()
            .map(|vert| {
                let p = vert.pos().coords;
                Coord {
                    x: p.dot(&u),
                    y: p.dot(&v),
                }
            })
            .collect();

        let polygon = GeoPolygon::new(LineString::new(coords.clone()), vec![]);
        let raw = polygon.earcut_triangles_raw();

        // Map earcut's vertex list back onto ours by position, since geo may
        // include the ring's closing coordinate.
        let nearest = |k: usize| -> usize {
            let (x, y) = (raw.vertices[2 * k], raw.vertices[2 * k + 1]);
            let mut best = 0;
            let mut best_d = Real::MAX;
            for (j, c) in coords.iter().enumerate() {
                let d = (c.x - x).powi(2) + (c.y - y).powi(2);
                if d < best_d {
                    best = j;
                    best_d = d;
                }
            }
            best
        };

        let mut out = Vec::with_capacity(raw.triangle_indices.len());
        for t in raw.triangle_indices.chunks_exact(3) {
            let (i0, i1, i2) = (nearest(t[0]), nearest(t[1]), nearest(t[2]));
            // earcut does not promise a winding, keep ours
            let (a, b, c) = (coords[i0], coords[i1], coords[i2]);
            let ccw = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) >= 0.0;
            if ccw {
                out.extend([i0, i1, i2]);
            } else {
                out.extend([i0, i2, i1]);
            }
        }
        out
    }
}
