use crate::bsp::Node;
use crate::config::CsgConfig;
use crate::errors::CsgError;
use crate::float_types::parry3d::{
    bounding_volume::Aabb,
    shape::{Shape, SharedShape, TriMesh},
};
use crate::float_types::Real;
use crate::plane::Plane;
use crate::polygon::Polygon;
use crate::vertex::{CsgVertex, Vertex};
use nalgebra::{Matrix4, Point3, Quaternion, Rotation3, Translation3, Unit, Vector3};
use std::fmt::Debug;

#[cfg(test)]
use crate::float_types::{PI, TAU};

/// The three binary boolean operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

impl BooleanOp {
    pub fn apply<S: Clone + Debug, V: CsgVertex>(
        self,
        a: &CSG<S, V>,
        b: &CSG<S, V>,
    ) -> CSG<S, V> {
        match self {
            BooleanOp::Union => a.union(b),
            BooleanOp::Difference => a.difference(b),
            BooleanOp::Intersection => a.intersection(b),
        }
    }
}

/// The main CSG solid structure: a flat list of polygons plus metadata and
/// the tolerances its boolean operations run with.
#[derive(Debug, Clone)]
pub struct CSG<S: Clone, V: CsgVertex = Vertex> {
    /// Boundary polygons, outward facing
    pub polygons: Vec<Polygon<S, V>>,

    /// Metadata
    pub metadata: Option<S>,

    pub config: CsgConfig,
}

impl<S: Clone + Debug, V: CsgVertex> Default for CSG<S, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Debug, V: CsgVertex> CSG<S, V> {
    /// Create an empty CSG
    pub fn new() -> Self {
        CSG {
            polygons: Vec::new(),
            metadata: None,
            config: CsgConfig::default(),
        }
    }

    /// Build a CSG from an existing polygon list
    pub fn from_polygons(polygons: &[Polygon<S, V>]) -> Self {
        CSG {
            polygons: polygons.to_vec(),
            metadata: None,
            config: CsgConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CsgConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<S>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same metadata and config as `self`, different polygons.
    fn with_polygons(&self, polygons: Vec<Polygon<S, V>>) -> Self {
        CSG {
            polygons,
            metadata: self.metadata.clone(),
            config: self.config,
        }
    }

    /// Helper to collect all vertices from the CSG.
    pub fn vertices(&self) -> Vec<V> {
        self.polygons
            .iter()
            .flat_map(|p| p.vertices.clone())
            .collect()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Shared clip/merge step of every boolean operation. `a` and `b` are
    /// trees built from clones of the operands; what lands in `a` is the
    /// union of the two solids, with overlapping coplanar faces kept once.
    fn union_trees(mut a: Node<S, V>, mut b: Node<S, V>) -> Node<S, V> {
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a
    }

    /// Run [`Self::union_trees`] with optional complements of the inputs and
    /// of the output.
    fn combine(
        &self,
        other: &CSG<S, V>,
        invert_a: bool,
        invert_b: bool,
        invert_result: bool,
    ) -> Vec<Polygon<S, V>> {
        let epsilon = self.config.epsilon;
        let mut a = Node::from_polygons(&self.polygons, epsilon);
        let mut b = Node::from_polygons(&other.polygons, epsilon);
        if invert_a {
            a.invert();
        }
        if invert_b {
            b.invert();
        }
        let mut result = Self::union_trees(a, b);
        if invert_result {
            result.invert();
        }
        result.all_polygons()
    }

    /// Return a new CSG representing union of the two CSG's.
    ///
    /// ```text
    /// let c = a.union(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |       +----+
    ///     +----+--+    |       +----+       |
    ///          |   b   |            |   c   |
    ///          |       |            |       |
    ///          +-------+            +-------+
    /// ```
    #[must_use = "Use new CSG representing space in both CSG's"]
    pub fn union(&self, other: &CSG<S, V>) -> CSG<S, V> {
        let polygons = if other.is_empty() {
            self.polygons.clone()
        } else if self.is_empty() {
            other.polygons.clone()
        } else {
            self.combine(other, false, false, false)
        };
        log::debug!(
            "union: {} + {} polygons -> {}",
            self.polygons.len(),
            other.polygons.len(),
            polygons.len()
        );
        self.with_polygons(polygons)
    }

    /// Return a new CSG representing difference of the two CSG's.
    ///
    /// Implemented as `!(!a | b)`.
    ///
    /// ```text
    /// let c = a.difference(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |    +--+
    ///     +----+--+    |       +----+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    #[must_use = "Use new CSG"]
    pub fn difference(&self, other: &CSG<S, V>) -> CSG<S, V> {
        // an inverted empty tree cannot stand for all of space, so the empty
        // cases never reach the kernel
        let polygons = if self.is_empty() {
            Vec::new()
        } else if other.is_empty() {
            self.polygons.clone()
        } else {
            self.combine(other, true, false, true)
        };
        log::debug!(
            "difference: {} - {} polygons -> {}",
            self.polygons.len(),
            other.polygons.len(),
            polygons.len()
        );
        self.with_polygons(polygons)
    }

    /// Alias for [`CSG::difference`].
    #[must_use = "Use new CSG"]
    pub fn subtract(&self, other: &CSG<S, V>) -> CSG<S, V> {
        self.difference(other)
    }

    /// Return a new CSG representing intersection of the two CSG's.
    ///
    /// Implemented as `!(!a | !b)`.
    ///
    /// ```text
    /// let c = a.intersection(b);
    ///     +-------+
    ///     |       |
    ///     |   a   |
    ///     |    +--+----+   =   +--+
    ///     +----+--+    |       +--+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    #[must_use = "Use new CSG"]
    pub fn intersection(&self, other: &CSG<S, V>) -> CSG<S, V> {
        let polygons = if self.is_empty() || other.is_empty() {
            Vec::new()
        } else {
            self.combine(other, true, true, true)
        };
        log::debug!(
            "intersection: {} & {} polygons -> {}",
            self.polygons.len(),
            other.polygons.len(),
            polygons.len()
        );
        self.with_polygons(polygons)
    }

    /// Return a new CSG representing space in this CSG excluding the space in the
    /// other CSG plus the space in the other CSG excluding the space in this CSG.
    ///
    /// ```text
    /// let c = a.xor(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   a   |
    ///     |    +--+----+   =   |    +--+----+
    ///     +----+--+    |       +----+--+    |
    ///          |   b   |            |       |
    ///          |       |            |       |
    ///          +-------+            +-------+
    /// ```
    #[must_use = "Use new CSG"]
    pub fn xor(&self, other: &CSG<S, V>) -> CSG<S, V> {
        // A \ B
        let a_sub_b = self.difference(other);

        // B \ A
        let b_sub_a = other.difference(self);

        // Union those two
        a_sub_b.union(&b_sub_a).with_metadata(self.metadata.clone())
    }

    /// Switch solid and empty space (flip every polygon). The complement of
    /// the empty solid is still empty.
    #[must_use = "Use new CSG"]
    pub fn complement(&self) -> CSG<S, V> {
        let mut csg = self.clone();
        for p in &mut csg.polygons {
            p.flip();
        }
        csg
    }

    /// Fold `op` over `operands` left to right, starting from `self`:
    /// `op(op(op(self, o0), o1), ...)`.
    #[must_use = "Use new CSG"]
    pub fn fold(&self, op: BooleanOp, operands: &[CSG<S, V>]) -> CSG<S, V> {
        operands
            .iter()
            .fold(self.clone(), |acc, operand| op.apply(&acc, operand))
    }

    #[must_use = "Use new CSG"]
    pub fn union_all(&self, operands: &[CSG<S, V>]) -> CSG<S, V> {
        self.fold(BooleanOp::Union, operands)
    }

    #[must_use = "Use new CSG"]
    pub fn difference_all(&self, operands: &[CSG<S, V>]) -> CSG<S, V> {
        self.fold(BooleanOp::Difference, operands)
    }

    #[must_use = "Use new CSG"]
    pub fn intersection_all(&self, operands: &[CSG<S, V>]) -> CSG<S, V> {
        self.fold(BooleanOp::Intersection, operands)
    }

    /// Combine a list of solids, seeding with the first and folding the rest.
    /// An empty list gives the empty solid.
    pub fn batch(op: BooleanOp, solids: &[CSG<S, V>]) -> CSG<S, V> {
        match solids.split_first() {
            Some((first, rest)) => first.fold(op, rest),
            None => CSG::new(),
        }
    }

    /// Signed enclosed volume (divergence theorem over the triangulated
    /// boundary). Positive for outward-facing solids.
    pub fn volume(&self) -> Real {
        self.polygons
            .iter()
            .flat_map(|p| p.triangulate())
            .map(|[a, b, c]| a.pos().coords.dot(&b.pos().coords.cross(&c.pos().coords)))
            .sum::<Real>()
            / 6.0
    }

    /// Axis aligned bounding box of every vertex. An empty solid gives a
    /// zero-size box at the origin.
    pub fn bounding_box(&self) -> Aabb {
        let mut points = self.polygons.iter().flat_map(|p| p.vertices.iter().map(|v| *v.pos()));
        let Some(first) = points.next() else {
            return Aabb::new(Point3::origin(), Point3::origin());
        };
        let (mins, maxs) = points.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));
        Aabb::new(mins, maxs)
    }

    /// Triangulate each polygon in the CSG returning a CSG containing triangles
    #[must_use = "Use the new CSG"]
    pub fn tessellate(&self) -> CSG<S, V> {
        let mut triangles = Vec::new();

        for poly in &self.polygons {
            for triangle in poly.triangulate() {
                triangles.push(Polygon::new(triangle.to_vec(), poly.metadata.clone()));
            }
        }

        self.with_polygons(triangles)
    }

    /// Convert the polygons in this `CSG` to a Parry `TriMesh`.
    /// Useful for collision detection or physics simulations.
    pub fn to_trimesh(&self) -> Result<SharedShape, CsgError> {
        Ok(SharedShape::new(self.build_trimesh()?))
    }

    fn build_trimesh(&self) -> Result<TriMesh, CsgError> {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut index_offset = 0;

        for poly in &self.polygons {
            for [a, b, c] in poly.triangulate() {
                vertices.push(*a.pos());
                vertices.push(*b.pos());
                vertices.push(*c.pos());

                indices.push([index_offset, index_offset + 1, index_offset + 2]);
                index_offset += 3;
            }
        }

        TriMesh::new(vertices, indices).map_err(|e| CsgError::TriMesh(format!("{e:?}")))
    }

    /// Mass, center of mass and principal inertia frame at `density`, via parry.
    pub fn mass_properties(
        &self,
        density: Real,
    ) -> Result<(Real, Point3<Real>, Unit<Quaternion<Real>>), CsgError> {
        let trimesh = self.build_trimesh()?;
        let mp = trimesh.mass_properties(density);
        Ok((mp.mass(), mp.local_com, mp.principal_inertia_local_frame))
    }
}

impl<S: Clone + Debug> CSG<S, Vertex> {
    /// Apply an arbitrary 3D transform (as a 4x4 matrix) to every polygon.
    ///
    /// Positions go through the matrix, normals through its inverse
    /// transpose. Mirroring transforms also reverse the winding so faces keep
    /// pointing out.
    pub fn transform(&self, mat: &Matrix4<Real>) -> Result<CSG<S, Vertex>, CsgError> {
        let inverse = mat.try_inverse().ok_or(CsgError::NonInvertibleTransform)?;
        Ok(self.transform_with(mat, &inverse.transpose()))
    }

    fn transform_with(
        &self,
        mat: &Matrix4<Real>,
        mat_inv_transpose: &Matrix4<Real>,
    ) -> CSG<S, Vertex> {
        let mirror = mat.fixed_view::<3, 3>(0, 0).into_owned().determinant() < 0.0;
        let mut csg = self.clone();

        for poly in &mut csg.polygons {
            for vert in &mut poly.vertices {
                vert.pos = mat.transform_point(&vert.pos);
                if let Some(n) = vert.normal.as_mut() {
                    *n = mat_inv_transpose.transform_vector(n).normalize();
                }
            }
            if mirror {
                poly.vertices.reverse();
            }
            poly.plane = Plane::from_points(
                &poly.vertices[0].pos,
                &poly.vertices[1].pos,
                &poly.vertices[2].pos,
            );
        }

        csg
    }

    /// Returns a new CSG translated by x, y, and z.
    #[must_use = "Use the new CSG"]
    pub fn translate(&self, x: Real, y: Real, z: Real) -> CSG<S, Vertex> {
        self.translate_vector(Vector3::new(x, y, z))
    }

    /// Returns a new CSG translated by vector.
    #[must_use = "Use the new CSG"]
    pub fn translate_vector(&self, vector: Vector3<Real>) -> CSG<S, Vertex> {
        let mat = Translation3::from(vector).to_homogeneous();
        // translation leaves normals untouched
        self.transform_with(&mat, &Matrix4::identity())
    }

    /// Rotates the CSG by x_degrees, y_degrees, z_degrees
    #[must_use = "Use the new CSG"]
    pub fn rotate(&self, x_deg: Real, y_deg: Real, z_deg: Real) -> CSG<S, Vertex> {
        let rot = Rotation3::from_euler_angles(
            x_deg.to_radians(),
            y_deg.to_radians(),
            z_deg.to_radians(),
        )
        .to_homogeneous();
        // a rotation is its own inverse transpose
        self.transform_with(&rot, &rot)
    }

    /// Scales the CSG by scale_x, scale_y, scale_z. A zero factor is rejected.
    pub fn scale(&self, sx: Real, sy: Real, sz: Real) -> Result<CSG<S, Vertex>, CsgError> {
        self.transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)))
    }

    /// Create a right prism (a box) that spans from (0, 0, 0)
    /// to (width, length, height). All dimensions must be >= 0.
    #[cfg(test)]
    pub(crate) fn cube(
        width: Real,
        length: Real,
        height: Real,
        metadata: Option<S>,
    ) -> CSG<S, Vertex> {
        // Define the eight corner points of the prism.
        //    (x, y, z)
        let p000 = Point3::new(0.0, 0.0, 0.0);
        let p100 = Point3::new(width, 0.0, 0.0);
        let p110 = Point3::new(width, length, 0.0);
        let p010 = Point3::new(0.0, length, 0.0);

        let p001 = Point3::new(0.0, 0.0, height);
        let p101 = Point3::new(width, 0.0, height);
        let p111 = Point3::new(width, length, height);
        let p011 = Point3::new(0.0, length, height);

        // Faces are wound counter-clockwise as seen from outside.
        let face = |corners: [Point3<Real>; 4], normal: Vector3<Real>| {
            Polygon::new(
                corners.iter().map(|&p| Vertex::new(p, normal)).collect(),
                metadata.clone(),
            )
        };

        let polygons = [
            // Bottom face (z=0, normal -Z)
            face([p000, p010, p110, p100], -Vector3::z()),
            // Top face (z=height, normal +Z)
            face([p001, p101, p111, p011], Vector3::z()),
            // Front face (y=0, normal -Y)
            face([p000, p100, p101, p001], -Vector3::y()),
            // Back face (y=length, normal +Y)
            face([p010, p011, p111, p110], Vector3::y()),
            // Left face (x=0, normal -X)
            face([p000, p001, p011, p010], -Vector3::x()),
            // Right face (x=width, normal +X)
            face([p100, p110, p111, p101], Vector3::x()),
        ];

        CSG::from_polygons(&polygons).with_metadata(metadata)
    }

    /// A cube with edge `size` centered on the origin.
    #[cfg(test)]
    pub(crate) fn cube_centered(size: Real, metadata: Option<S>) -> CSG<S, Vertex> {
        let half = size / 2.0;
        CSG::cube(size, size, size, metadata).translate(-half, -half, -half)
    }

    /// Construct a sphere with radius, segments, stacks
    #[cfg(test)]
    pub(crate) fn sphere(
        radius: Real,
        segments: usize,
        stacks: usize,
        metadata: Option<S>,
    ) -> CSG<S, Vertex> {
        let mut polygons = Vec::new();

        let vertex = |theta: Real, phi: Real| {
            let dir = Vector3::new(theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
            Vertex::new(Point3::from(dir * radius), dir)
        };

        for i in 0..segments {
            for j in 0..stacks {
                let theta0 = i as Real / segments as Real * TAU;
                let theta1 = (i + 1) as Real / segments as Real * TAU;
                let phi0 = j as Real / stacks as Real * PI;
                let phi1 = (j + 1) as Real / stacks as Real * PI;

                let mut vertices = vec![vertex(theta0, phi0)];
                if j > 0 {
                    vertices.push(vertex(theta1, phi0));
                }
                if j < stacks - 1 {
                    vertices.push(vertex(theta1, phi1));
                }
                vertices.push(vertex(theta0, phi1));

                polygons.push(Polygon::new(vertices, metadata.clone()));
            }
        }
        CSG::from_polygons(&polygons).with_metadata(metadata)
    }
}
