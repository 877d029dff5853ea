//! Exchange with flat triangle buffers, the form renderers and file loaders use.

use crate::config::CsgConfig;
use crate::csg::CSG;
use crate::errors::CsgError;
use crate::float_types::Real;
use crate::polygon::Polygon;
use crate::vertex::Vertex;
use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use std::fmt::Debug;

/// A triangle soup: every three consecutive positions (or, when `indices` is
/// present, every three consecutive indices) form one triangle.
///
/// `normals` and `uvs`, when present, have one entry per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub positions: Vec<[Real; 3]>,
    pub normals: Option<Vec<[Real; 3]>>,
    pub uvs: Option<Vec<[Real; 2]>>,
    pub indices: Option<Vec<u32>>,
}

impl TriangleMesh {
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Expand an indexed mesh so every triangle owns its three vertices.
    /// Non-indexed meshes are returned as they are.
    pub fn to_non_indexed(&self) -> Result<TriangleMesh, CsgError> {
        let Some(indices) = &self.indices else {
            return Ok(self.clone());
        };
        if indices.len() % 3 != 0 {
            return Err(CsgError::MalformedMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        self.check_attribute_lengths()?;

        let len = self.positions.len();
        let lookup = |i: u32| -> Result<usize, CsgError> {
            let i = i as usize;
            if i < len {
                Ok(i)
            } else {
                Err(CsgError::IndexOutOfRange { index: i, len })
            }
        };
        let order = indices
            .iter()
            .map(|&i| lookup(i))
            .collect::<Result<Vec<usize>, CsgError>>()?;

        Ok(TriangleMesh {
            positions: order.iter().map(|&i| self.positions[i]).collect(),
            normals: self
                .normals
                .as_ref()
                .map(|n| order.iter().map(|&i| n[i]).collect()),
            uvs: self
                .uvs
                .as_ref()
                .map(|uv| order.iter().map(|&i| uv[i]).collect()),
            indices: None,
        })
    }

    fn check_attribute_lengths(&self) -> Result<(), CsgError> {
        let len = self.positions.len();
        if let Some(normals) = &self.normals {
            if normals.len() != len {
                return Err(CsgError::MalformedMesh(format!(
                    "{} normals for {len} positions",
                    normals.len()
                )));
            }
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != len {
                return Err(CsgError::MalformedMesh(format!(
                    "{} uvs for {len} positions",
                    uvs.len()
                )));
            }
        }
        Ok(())
    }
}

fn all_finite(values: &[Real]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Rotate `corners` so the first three span the face: not collinear, and
/// turning the same way as the whole face (Newell normal). Returns false when
/// no such corner exists.
fn rotate_to_spanning_corner(corners: &mut [Vertex], epsilon: Real) -> bool {
    let n = corners.len();
    let newell: Vector3<Real> = (0..n)
        .map(|i| corners[i].pos.coords.cross(&corners[(i + 1) % n].pos.coords))
        .sum();

    let start = (0..n).find(|&i| {
        let a = corners[i].pos;
        let (ab, ac) = (corners[(i + 1) % n].pos - a, corners[(i + 2) % n].pos - a);
        let cross = ab.cross(&ac);
        cross.norm() > epsilon * ab.norm() * ac.norm() && cross.dot(&newell) > 0.0
    });
    match start {
        Some(i) => {
            corners.rotate_left(i);
            true
        }
        None => false,
    }
}

impl<S: Clone + Debug> CSG<S, Vertex> {
    /// Build a solid from a triangle mesh, one polygon per triangle, all
    /// tagged with `metadata`. Indexed meshes are expanded first.
    ///
    /// Degenerate triangles are skipped. Mismatched attribute lengths,
    /// out-of-range indices and non-finite values are errors.
    pub fn from_mesh(
        mesh: &TriangleMesh,
        metadata: Option<S>,
    ) -> Result<CSG<S, Vertex>, CsgError> {
        Self::from_mesh_with_config(mesh, metadata, CsgConfig::default())
    }

    /// [`CSG::from_mesh`] with degenerate triangles judged by
    /// `config.epsilon`. The solid carries `config`.
    pub fn from_mesh_with_config(
        mesh: &TriangleMesh,
        metadata: Option<S>,
        config: CsgConfig,
    ) -> Result<CSG<S, Vertex>, CsgError> {
        let mesh = mesh.to_non_indexed()?;
        if mesh.positions.len() % 3 != 0 {
            return Err(CsgError::MalformedMesh(format!(
                "position count {} is not a multiple of 3",
                mesh.positions.len()
            )));
        }
        mesh.check_attribute_lengths()?;

        let mut vertices = Vec::with_capacity(mesh.positions.len());
        for (index, p) in mesh.positions.iter().enumerate() {
            let normal = mesh.normals.as_ref().map(|n| n[index]);
            let uv = mesh.uvs.as_ref().map(|uv| uv[index]);
            if !all_finite(p)
                || !normal.is_none_or(|n| all_finite(&n))
                || !uv.is_none_or(|uv| all_finite(&uv))
            {
                return Err(CsgError::NonFiniteCoordinate { index });
            }
            vertices.push(Vertex::with_attributes(
                Point3::from(*p),
                normal.map(Vector3::from),
                uv.map(Vector2::from),
            ));
        }

        let epsilon = config.epsilon;
        let mut polygons = Vec::with_capacity(vertices.len() / 3);
        for (i, tri) in vertices.chunks_exact(3).enumerate() {
            let polygon = Polygon::new(tri.to_vec(), metadata.clone());
            if polygon.is_degenerate(epsilon) {
                log::warn!("skipping degenerate triangle {i}");
                continue;
            }
            polygons.push(polygon);
        }

        log::debug!(
            "from_mesh: {} triangles -> {} polygons",
            vertices.len() / 3,
            polygons.len()
        );
        Ok(CSG::from_polygons(&polygons)
            .with_metadata(metadata)
            .with_config(config))
    }

    /// [`CSG::from_mesh`] followed by [`CSG::transform`].
    pub fn from_mesh_transformed(
        mesh: &TriangleMesh,
        mat: &Matrix4<Real>,
        metadata: Option<S>,
    ) -> Result<CSG<S, Vertex>, CsgError> {
        Self::from_mesh(mesh, metadata)?.transform(mat)
    }

    /// Flatten the solid into a non-indexed triangle mesh.
    ///
    /// Normals (uvs) are written when the first vertex carries one; vertices
    /// without a normal then get their polygon's plane normal, vertices
    /// without a uv get `[0, 0]`.
    pub fn to_mesh(&self) -> TriangleMesh {
        let first = self.polygons.first().map(|p| &p.vertices[0]);
        let with_normals = first.is_some_and(|v| v.normal.is_some());
        let with_uvs = first.is_some_and(|v| v.uv.is_some());

        let mut positions: Vec<[Real; 3]> = Vec::new();
        let mut normals: Vec<[Real; 3]> = Vec::new();
        let mut uvs: Vec<[Real; 2]> = Vec::new();

        for poly in &self.polygons {
            for triangle in poly.triangulate() {
                for v in &triangle {
                    positions.push(v.pos.into());
                    if with_normals {
                        normals.push(v.normal.unwrap_or(poly.plane.normal).into());
                    }
                    if with_uvs {
                        uvs.push(v.uv.unwrap_or_else(Vector2::zeros).into());
                    }
                }
            }
        }

        TriangleMesh {
            positions,
            normals: with_normals.then_some(normals),
            uvs: with_uvs.then_some(uvs),
            indices: None,
        }
    }

    /// Create a polyhedron from a list of points and faces indexing into them.
    ///
    /// Faces must be wound counter-clockwise seen from outside. Collinear
    /// runs of corners are allowed. Non-planar faces are split into a triangle
    /// fan, faces with no spanning corner at all are skipped. Every vertex
    /// gets its face's normal.
    pub fn polyhedron(
        points: &[[Real; 3]],
        faces: &[Vec<usize>],
        metadata: Option<S>,
    ) -> Result<CSG<S, Vertex>, CsgError> {
        Self::polyhedron_with_config(points, faces, metadata, CsgConfig::default())
    }

    /// [`CSG::polyhedron`] with degeneracy and planarity judged by
    /// `config.epsilon`. The solid carries `config`.
    pub fn polyhedron_with_config(
        points: &[[Real; 3]],
        faces: &[Vec<usize>],
        metadata: Option<S>,
        config: CsgConfig,
    ) -> Result<CSG<S, Vertex>, CsgError> {
        if let Some(index) = points.iter().position(|p| !all_finite(p)) {
            return Err(CsgError::NonFiniteCoordinate { index });
        }

        let epsilon = config.epsilon;
        let mut polygons = Vec::new();

        for (face_index, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(CsgError::DegenerateFace { face: face_index });
            }

            let mut corners = Vec::with_capacity(face.len());
            for &idx in face {
                let p = points.get(idx).ok_or(CsgError::IndexOutOfRange {
                    index: idx,
                    len: points.len(),
                })?;
                corners.push(Vertex::from_pos(Point3::from(*p)));
            }

            if !rotate_to_spanning_corner(&mut corners, epsilon) {
                log::warn!("skipping degenerate face {face_index}");
                continue;
            }
            let polygon = Polygon::new(corners, metadata.clone());

            let planar = polygon
                .vertices
                .iter()
                .all(|v| polygon.plane.signed_distance(&v.pos).abs() <= epsilon);
            let pieces = if planar {
                vec![polygon]
            } else {
                log::debug!("face {face_index} is not planar, splitting into a fan");
                (1..face.len() - 1)
                    .map(|i| {
                        let v = &polygon.vertices;
                        let corners = vec![v[0].clone(), v[i].clone(), v[i + 1].clone()];
                        Polygon::new(corners, metadata.clone())
                    })
                    .filter(|t| !t.is_degenerate(epsilon))
                    .collect()
            };

            for mut piece in pieces {
                let normal = piece.plane.normal;
                for v in &mut piece.vertices {
                    v.normal = Some(normal);
                }
                polygons.push(piece);
            }
        }

        Ok(CSG::from_polygons(&polygons)
            .with_metadata(metadata)
            .with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle_positions() -> Vec<[Real; 3]> {
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
    }

    fn unit_cube_points() -> Vec<[Real; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ]
    }

    fn unit_cube_faces() -> Vec<Vec<usize>> {
        vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![3, 7, 6, 2],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ]
    }

    #[test]
    fn counts() {
        let mesh = TriangleMesh {
            positions: unit_cube_points(),
            indices: Some(vec![0, 1, 2, 0, 2, 3]),
            ..Default::default()
        };
        assert!(mesh.is_indexed());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 2);

        let flat = mesh.to_non_indexed().unwrap();
        assert!(!flat.is_indexed());
        assert_eq!(flat.vertex_count(), 6);
        assert_eq!(flat.triangle_count(), 2);
        assert_eq!(flat.positions[3], [0.0, 0.0, 0.0]);
        assert_eq!(flat.positions[5], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn from_mesh_makes_one_polygon_per_triangle() {
        let mesh = TriangleMesh {
            positions: triangle_positions(),
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
            indices: None,
        };
        let csg: CSG<&str> = CSG::from_mesh(&mesh, Some("part")).unwrap();
        assert_eq!(csg.polygons.len(), 1);
        let poly = &csg.polygons[0];
        assert_eq!(poly.metadata, Some("part"));
        assert_relative_eq!(poly.plane.normal, Vector3::z());
        assert_eq!(poly.vertices[1].uv, Some(Vector2::new(1.0, 0.0)));
        assert_eq!(poly.vertices[2].normal, Some(Vector3::z()));
    }

    #[test]
    fn from_mesh_expands_indices() {
        let mesh = TriangleMesh {
            positions: unit_cube_points(),
            indices: Some(vec![0, 1, 2, 0, 2, 3]),
            ..Default::default()
        };
        let csg: CSG<()> = CSG::from_mesh(&mesh, None).unwrap();
        assert_eq!(csg.polygons.len(), 2);
        assert_eq!(csg.polygons[1].vertices[2].pos, Point3::new(0.0, 1.0, 0.0));
        assert!(csg.polygons[0].vertices[0].normal.is_none());
    }

    #[test]
    fn from_mesh_skips_degenerate_triangles() {
        let mut positions = triangle_positions();
        positions.extend([[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]);
        positions.extend([[5.0, 5.0, 5.0], [5.0, 5.0, 5.0], [6.0, 5.0, 5.0]]);
        let mesh = TriangleMesh {
            positions,
            ..Default::default()
        };
        let csg: CSG<()> = CSG::from_mesh(&mesh, None).unwrap();
        assert_eq!(csg.polygons.len(), 1);
    }

    #[test]
    fn from_mesh_keeps_tiny_triangles() {
        let positions = triangle_positions()
            .into_iter()
            .map(|[x, y, z]| [x * 1e-4, y * 1e-4, z * 1e-4])
            .collect();
        let mesh = TriangleMesh {
            positions,
            ..Default::default()
        };
        let csg: CSG<()> = CSG::from_mesh(&mesh, None).unwrap();
        assert_eq!(csg.polygons.len(), 1);
    }

    #[test]
    fn from_mesh_rejects_malformed_input() {
        let short = TriangleMesh {
            positions: vec![[0.0; 3]; 4],
            ..Default::default()
        };
        assert!(matches!(
            CSG::<()>::from_mesh(&short, None),
            Err(CsgError::MalformedMesh(_))
        ));

        let bad_normals = TriangleMesh {
            positions: triangle_positions(),
            normals: Some(vec![[0.0, 0.0, 1.0]; 2]),
            ..Default::default()
        };
        assert!(matches!(
            CSG::<()>::from_mesh(&bad_normals, None),
            Err(CsgError::MalformedMesh(_))
        ));

        let bad_index = TriangleMesh {
            positions: triangle_positions(),
            indices: Some(vec![0, 1, 3]),
            ..Default::default()
        };
        assert_eq!(
            CSG::<()>::from_mesh(&bad_index, None).unwrap_err(),
            CsgError::IndexOutOfRange { index: 3, len: 3 }
        );

        let mut positions = triangle_positions();
        positions[2][1] = Real::NAN;
        let nan = TriangleMesh {
            positions,
            ..Default::default()
        };
        assert_eq!(
            CSG::<()>::from_mesh(&nan, None).unwrap_err(),
            CsgError::NonFiniteCoordinate { index: 2 }
        );
    }

    #[test]
    fn from_mesh_transformed_moves_vertices() {
        let mesh = TriangleMesh {
            positions: triangle_positions(),
            ..Default::default()
        };
        let mat = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 3.0));
        let csg: CSG<()> = CSG::from_mesh_transformed(&mesh, &mat, None).unwrap();
        assert!(csg.polygons[0].vertices.iter().all(|v| v.pos.z == 3.0));
        assert_relative_eq!(csg.polygons[0].plane.w, 3.0);
    }

    #[test]
    fn to_mesh_fills_missing_attributes() {
        let with_normal = Vertex::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 2.0));
        let bare = |x, y| Vertex::from_pos(Point3::new(x, y, 0.0));
        let csg: CSG<()> = CSG::from_polygons(&[Polygon::new(
            vec![with_normal, bare(1.0, 0.0), bare(1.0, 1.0), bare(0.0, 1.0)],
            None,
        )]);

        let mesh = csg.to_mesh();
        assert!(!mesh.is_indexed());
        assert_eq!(mesh.triangle_count(), 2);
        let normals = mesh.normals.unwrap();
        assert_eq!(normals.len(), 6);
        assert_eq!(normals[0], [0.0, 0.0, 2.0]);
        assert_eq!(normals[1], [0.0, 0.0, 1.0]);
        assert!(mesh.uvs.is_none());
    }

    #[test]
    fn to_mesh_of_empty_solid_is_empty() {
        let mesh = CSG::<()>::new().to_mesh();
        assert_eq!(mesh, TriangleMesh::default());
    }

    #[test]
    fn mesh_round_trip_keeps_triangles() {
        let cube: CSG<()> = CSG::cube(1.0, 1.0, 1.0, None);
        let mesh = cube.to_mesh();
        assert_eq!(mesh.triangle_count(), 12);
        let back: CSG<()> = CSG::from_mesh(&mesh, None).unwrap();
        assert_eq!(back.polygons.len(), 12);
        assert_relative_eq!(back.volume(), 1.0, epsilon = 1e-9);
        assert_eq!(back.to_mesh(), mesh);
    }

    #[test]
    fn polyhedron_cube_has_unit_volume() {
        let csg: CSG<()> = CSG::polyhedron(&unit_cube_points(), &unit_cube_faces(), None).unwrap();
        assert_eq!(csg.polygons.len(), 6);
        assert_relative_eq!(csg.volume(), 1.0, epsilon = 1e-9);
        for poly in &csg.polygons {
            for v in &poly.vertices {
                assert_eq!(v.normal, Some(poly.plane.normal));
            }
        }
    }

    #[test]
    fn polyhedron_splits_non_planar_faces() {
        let points = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.5],
            [0.0, 1.0, 0.0],
        ];
        let csg: CSG<()> = CSG::polyhedron(&points, &[vec![0, 1, 2, 3]], None).unwrap();
        assert_eq!(csg.polygons.len(), 2);
        assert!(csg.polygons.iter().all(|p| p.vertices.len() == 3));
    }

    #[test]
    fn polyhedron_errors() {
        let points = unit_cube_points();
        assert_eq!(
            CSG::<()>::polyhedron(&points, &[vec![0, 1]], None).unwrap_err(),
            CsgError::DegenerateFace { face: 0 }
        );
        assert_eq!(
            CSG::<()>::polyhedron(&points, &[vec![0, 1, 2], vec![0, 1, 8]], None).unwrap_err(),
            CsgError::IndexOutOfRange { index: 8, len: 8 }
        );
    }

    #[test]
    fn polyhedron_keeps_face_starting_on_a_straight_run() {
        // square with a midpoint on its first edge
        let points = [
            [0.0, 0.0, 0.0],
            [0.5, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let csg: CSG<()> = CSG::polyhedron(&points, &[vec![0, 1, 2, 3, 4]], None).unwrap();
        assert_eq!(csg.polygons.len(), 1);
        let poly = &csg.polygons[0];
        assert_eq!(poly.vertices.len(), 5);
        assert_relative_eq!(poly.plane.normal, Vector3::z(), epsilon = 1e-12);
        assert!(poly.vertices.iter().all(|v| v.normal == Some(poly.plane.normal)));

        let area: Real = poly
            .triangulate()
            .iter()
            .map(|[a, b, c]| (b.pos - a.pos).cross(&(c.pos - a.pos)).z / 2.0)
            .sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn polyhedron_plane_follows_whole_face_winding() {
        // notched square; the notch corner follows the first one, so the
        // first three corners turn against the face
        let points = [
            [0.5, 0.5, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let csg: CSG<()> = CSG::polyhedron(&points, &[vec![4, 0, 1, 2, 3]], None).unwrap();
        assert_relative_eq!(csg.polygons[0].plane.normal, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn polyhedron_with_config_uses_its_epsilon() {
        // 1e-4 out of plane: planar only for the coarse tolerance
        let points = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 1e-4],
            [0.0, 1.0, 0.0],
        ];
        let coarse = CsgConfig::new(1e-3).unwrap();
        let faces = [vec![0, 1, 2, 3]];

        let fine: CSG<()> = CSG::polyhedron(&points, &faces, None).unwrap();
        assert_eq!(fine.polygons.len(), 2);

        let csg: CSG<()> = CSG::polyhedron_with_config(&points, &faces, None, coarse).unwrap();
        assert_eq!(csg.polygons.len(), 1);
        assert_eq!(csg.config, coarse);
    }

    #[test]
    fn from_mesh_with_config_uses_its_epsilon() {
        // sine of the first corner angle is about 1e-4
        let mesh = TriangleMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1e-4, 0.0]],
            ..Default::default()
        };
        let kept: CSG<()> = CSG::from_mesh(&mesh, None).unwrap();
        assert_eq!(kept.polygons.len(), 1);
        assert_eq!(kept.config, CsgConfig::default());

        let coarse = CsgConfig::new(1e-3).unwrap();
        let skipped: CSG<()> = CSG::from_mesh_with_config(&mesh, None, coarse).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(skipped.config, coarse);
    }

    #[test]
    fn polyhedron_skips_collinear_faces() {
        let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let csg: CSG<()> = CSG::polyhedron(&points, &[vec![0, 1, 2], vec![0, 1, 3]], None).unwrap();
        assert_eq!(csg.polygons.len(), 1);
    }
}
