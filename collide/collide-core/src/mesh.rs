//! Triangle mesh container and the vertex-supplier abstraction.
//!
//! A [`TriMesh`] owns vertices, triangle indices, optional per-triangle
//! feature flags, and the no-leaf BVH built over the triangles. Queries
//! never read vertex data out of the tree: they go through the
//! [`VertexSource`] indirection, which is what lets [`TriMesh::refit`]
//! observe deformed geometry without a rebuild.

use nalgebra::{Point3, Vector3};

use collide_types::{Aabb, CollideError, TriFlags};

use crate::bvh::{AabbTree, NoLeafTree};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Supplies the three vertices of a triangle by index.
///
/// Must be pure within a single query: two fetches of the same index during
/// one traversal must observe the same coordinates.
pub trait VertexSource {
    /// Number of triangles available.
    fn triangle_count(&self) -> usize;

    /// Fetch the three vertices of triangle `index`.
    fn triangle(&self, index: u32) -> [Point3<f64>; 3];
}

/// A single triangle as three vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tri {
    /// Index of first vertex.
    pub v0: u32,
    /// Index of second vertex.
    pub v1: u32,
    /// Index of third vertex.
    pub v2: u32,
}

impl Tri {
    /// Create a triangle from vertex indices.
    #[must_use]
    pub const fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self { v0, v1, v2 }
    }
}

/// Triangle mesh collision data.
///
/// The mesh is defined in local coordinates; queries carry the world
/// transform separately. The BVH is built in the constructor and refit in
/// place after deformation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<Tri>,
    /// Per-triangle feature gates; `None` means all features enabled.
    tri_flags: Option<Vec<TriFlags>>,
    /// Marks a closed surface: back-side capsule contacts are interior and
    /// get culled.
    closed_surface: bool,
    /// Bounds of the whole mesh in local coordinates.
    aabb: Aabb,
    /// No-leaf BVH over the triangles. Skipped during serialization,
    /// rebuilt on demand.
    #[cfg_attr(feature = "serde", serde(skip))]
    tree: Option<NoLeafTree>,
}

impl PartialEq for TriMesh {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.triangles == other.triangles
    }
}

impl TriMesh {
    /// Create a mesh from vertices and flat triangle indices.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::EmptyMesh`] when `indices` is empty.
    ///
    /// # Panics
    ///
    /// Panics if `indices.len()` is not a multiple of 3 or any index is out
    /// of bounds.
    pub fn new(vertices: Vec<Point3<f64>>, indices: Vec<u32>) -> Result<Self, CollideError> {
        assert!(
            indices.len() % 3 == 0,
            "triangle indices must be a multiple of 3"
        );
        let triangles: Vec<Tri> = indices
            .chunks(3)
            .map(|chunk| Tri::new(chunk[0], chunk[1], chunk[2]))
            .collect();
        Self::from_triangles(vertices, triangles)
    }

    /// Create a mesh from vertices and triangle records.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::EmptyMesh`] when `triangles` is empty.
    ///
    /// # Panics
    ///
    /// Panics if any vertex index is out of bounds.
    pub fn from_triangles(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<Tri>,
    ) -> Result<Self, CollideError> {
        if triangles.is_empty() {
            return Err(CollideError::EmptyMesh);
        }
        let max_vertex = vertices.len() as u32;
        for tri in &triangles {
            assert!(
                tri.v0 < max_vertex && tri.v1 < max_vertex && tri.v2 < max_vertex,
                "triangle index out of bounds (max: {})",
                max_vertex - 1
            );
        }

        let aabb = Self::compute_aabb(&vertices);

        let mut mesh = Self {
            vertices,
            triangles,
            tri_flags: None,
            closed_surface: false,
            aabb,
            tree: None,
        };
        mesh.tree = Some(Self::build_tree(&mesh)?);
        Ok(mesh)
    }

    /// Attach per-triangle feature flags.
    ///
    /// # Panics
    ///
    /// Panics if the flag count differs from the triangle count.
    #[must_use]
    pub fn with_tri_flags(mut self, flags: Vec<TriFlags>) -> Self {
        assert_eq!(
            flags.len(),
            self.triangles.len(),
            "one flag byte per triangle"
        );
        self.tri_flags = Some(flags);
        self
    }

    /// Mark the mesh as a closed surface.
    #[must_use]
    pub fn with_closed_surface(mut self) -> Self {
        self.closed_surface = true;
        self
    }

    fn compute_aabb(vertices: &[Point3<f64>]) -> Aabb {
        if vertices.is_empty() {
            return Aabb::default();
        }
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        Aabb::from_min_max(min, max)
    }

    fn build_tree(mesh: &Self) -> Result<NoLeafTree, CollideError> {
        let generic = AabbTree::from_source(mesh)?;
        NoLeafTree::build(&generic)
    }

    /// Rebuild the BVH if absent (deserialized meshes).
    pub fn ensure_tree(&mut self) -> Result<(), CollideError> {
        if self.tree.is_none() {
            tracing::debug!(
                triangles = self.triangles.len(),
                "rebuilding mesh BVH after deserialization"
            );
            self.tree = Some(Self::build_tree(self)?);
        }
        Ok(())
    }

    /// Refit the BVH bottom-up after vertices moved. Topology is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::EmptyMesh`] when the tree was never built.
    pub fn refit(&mut self) -> Result<(), CollideError> {
        let mut tree = self.tree.take().ok_or(CollideError::EmptyMesh)?;
        tree.refit(self);
        self.tree = Some(tree);
        self.aabb = Self::compute_aabb(&self.vertices);
        Ok(())
    }

    /// Replace a vertex (deformation entry point; call [`Self::refit`]
    /// when done mutating).
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set_vertex(&mut self, index: usize, position: Point3<f64>) {
        self.vertices[index] = position;
    }

    /// The vertices in local coordinates.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// The triangle records.
    #[must_use]
    pub fn triangles(&self) -> &[Tri] {
        &self.triangles
    }

    /// Local-space bounds of the whole mesh.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Whether the mesh is flagged as a closed surface.
    #[must_use]
    pub fn is_closed_surface(&self) -> bool {
        self.closed_surface
    }

    /// Feature flags for a triangle (ALL when none were attached).
    #[must_use]
    pub fn tri_flags(&self, index: u32) -> TriFlags {
        self.tri_flags
            .as_ref()
            .and_then(|f| f.get(index as usize).copied())
            .unwrap_or(TriFlags::ALL)
    }

    /// The no-leaf BVH, if built.
    #[must_use]
    pub fn tree(&self) -> Option<&NoLeafTree> {
        self.tree.as_ref()
    }

    /// Face normal of a triangle, or `None` when degenerate.
    #[must_use]
    pub fn triangle_normal(&self, index: u32) -> Option<Vector3<f64>> {
        let [v0, v1, v2] = self.triangle(index);
        let n = (v1 - v0).cross(&(v2 - v0));
        let len = n.norm();
        if len > 1e-12 {
            Some(n / len)
        } else {
            None
        }
    }
}

impl VertexSource for TriMesh {
    fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn triangle(&self, index: u32) -> [Point3<f64>; 3] {
        let tri = &self.triangles[index as usize];
        [
            self.vertices[tri.v0 as usize],
            self.vertices[tri.v1 as usize],
            self.vertices[tri.v2 as usize],
        ]
    }
}

/// A unit cube mesh centered at the origin (12 triangles, outward winding).
///
/// Shared by tests and examples.
#[must_use]
#[allow(clippy::missing_panics_doc, clippy::expect_used)] // constant mesh cannot fail
pub fn unit_cube_mesh() -> TriMesh {
    let h = 0.5;
    let vertices = vec![
        Point3::new(-h, -h, -h),
        Point3::new(h, -h, -h),
        Point3::new(h, h, -h),
        Point3::new(-h, h, -h),
        Point3::new(-h, -h, h),
        Point3::new(h, -h, h),
        Point3::new(h, h, h),
        Point3::new(-h, h, h),
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // bottom (-Z)
        4, 5, 6, 4, 6, 7, // top (+Z)
        0, 1, 5, 0, 5, 4, // front (-Y)
        2, 3, 7, 2, 7, 6, // back (+Y)
        0, 4, 7, 0, 7, 3, // left (-X)
        1, 2, 6, 1, 6, 5, // right (+X)
    ];
    TriMesh::new(vertices, indices).expect("unit cube is a valid mesh")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mesh_creation() {
        let mesh = unit_cube_mesh();
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertices().len(), 8);
        assert!(mesh.tree().is_some());
        assert_relative_eq!(mesh.aabb().extents.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let err = TriMesh::new(vec![Point3::origin()], vec![]).unwrap_err();
        assert_eq!(err, CollideError::EmptyMesh);
    }

    #[test]
    fn test_vertex_source() {
        let mesh = unit_cube_mesh();
        let [v0, v1, v2] = mesh.triangle(0);
        assert_eq!(v0, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(v1, Point3::new(0.5, 0.5, -0.5));
        assert_eq!(v2, Point3::new(0.5, -0.5, -0.5));
    }

    #[test]
    fn test_tri_flags_default_all() {
        let mesh = unit_cube_mesh();
        assert_eq!(mesh.tri_flags(3), TriFlags::ALL);

        let flags = vec![TriFlags::EDGE0; 12];
        let mesh = unit_cube_mesh().with_tri_flags(flags);
        assert_eq!(mesh.tri_flags(3), TriFlags::EDGE0);
    }

    #[test]
    fn test_triangle_normal() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        let n = mesh.triangle_normal(0).unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_triangle_normal_is_none() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        assert!(mesh.triangle_normal(0).is_none());
    }

    #[test]
    fn test_refit_updates_mesh_aabb() {
        let mut mesh = unit_cube_mesh();
        mesh.set_vertex(6, Point3::new(2.0, 2.0, 2.0));
        mesh.refit().unwrap();
        assert_relative_eq!(mesh.aabb().max().x, 2.0, epsilon = 1e-12);
    }
}
