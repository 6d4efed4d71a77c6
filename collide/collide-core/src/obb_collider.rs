//! OBB-vs-tree collider.
//!
//! Recurses a single oriented query box against a mesh's no-leaf BVH and
//! collects the indices of triangles overlapping the box: node boxes are
//! culled with the relative-transform OBB test, leaf triangles with a
//! triangle-vs-box SAT in the query box's frame. The narrow-phase SAT
//! generators consume the candidate list.
//!
//! # Temporal coherence
//!
//! [`ObbCache`] keeps the previous query's box fattened by a coefficient
//! (default 1.1) together with the list it produced. While the new query
//! box still fits inside the fattened box, the cached list is replayed
//! instead of descending; the cache is write-through and never affects
//! correctness, only traversal cost.

use nalgebra::{Isometry3, Matrix3, Point3, Vector3};

use collide_types::{abs_rotation, boxes_overlap_relative, Aabb, CollideError, Obb};

use crate::bvh::{NoLeafTree, NodeRef};
use crate::mesh::{TriMesh, VertexSource};
use crate::narrow::tri_aabb_overlap;

/// Default fattening coefficient for the cached box.
const DEFAULT_FAT_COEFF: f64 = 1.1;

/// Cached result of the previous OBB query against one mesh.
#[derive(Debug, Clone)]
pub struct ObbCache {
    /// The previous query box, fattened, in world space. `None` until the
    /// first query.
    fat_obb: Option<Obb>,
    /// Triangle indices the fattened box produced.
    touched: Vec<u32>,
    /// Extents multiplier applied when storing a query box.
    pub fat_coeff: f64,
}

impl Default for ObbCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ObbCache {
    /// Create an empty cache with the default fattening coefficient.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fat_obb: None,
            touched: Vec::new(),
            fat_coeff: DEFAULT_FAT_COEFF,
        }
    }

    /// Create a cache with a custom fattening coefficient.
    #[must_use]
    pub fn with_fat_coeff(fat_coeff: f64) -> Self {
        Self {
            fat_obb: None,
            touched: Vec::new(),
            fat_coeff,
        }
    }

    /// Whether a fattened box is currently stored.
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.fat_obb.is_some()
    }

    /// Drop the cached box, forcing the next query to descend.
    pub fn invalidate(&mut self) {
        self.fat_obb = None;
        self.touched.clear();
    }
}

/// Collider for one oriented box against one mesh BVH.
#[derive(Debug)]
pub struct ObbCollider {
    // Settings
    temporal_coherence: bool,

    // Per-query state: the box in mesh-local space.
    local_center: Point3<f64>,
    local_extents: Vector3<f64>,
    local_rot: Matrix3<f64>,
    abs_rot: Matrix3<f64>,

    touched: Vec<u32>,

    // Stats
    nb_bv_tests: usize,
    nb_prim_tests: usize,
}

impl Default for ObbCollider {
    fn default() -> Self {
        Self::new()
    }
}

impl ObbCollider {
    /// Create a collider with temporal coherence disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temporal_coherence: false,
            local_center: Point3::origin(),
            local_extents: Vector3::zeros(),
            local_rot: Matrix3::identity(),
            abs_rot: Matrix3::identity(),
            touched: Vec::new(),
            nb_bv_tests: 0,
            nb_prim_tests: 0,
        }
    }

    /// Enable or disable replay from the fattened-box cache.
    pub fn set_temporal_coherence(&mut self, flag: bool) {
        self.temporal_coherence = flag;
    }

    /// Triangle indices touched by the last query.
    #[must_use]
    pub fn touched(&self) -> &[u32] {
        &self.touched
    }

    /// Whether the last query touched any triangle.
    #[must_use]
    pub fn contact_status(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Number of box-vs-node tests in the last query.
    #[must_use]
    pub fn nb_bv_tests(&self) -> usize {
        self.nb_bv_tests
    }

    /// Number of triangle-vs-box tests in the last query.
    #[must_use]
    pub fn nb_prim_tests(&self) -> usize {
        self.nb_prim_tests
    }

    /// Collect candidate triangles for a world-space query box.
    ///
    /// With temporal coherence enabled, a query box still inside the
    /// cache's fattened box replays the cached candidate list. Otherwise
    /// the tree is descended and the cache refilled with the fattened box's
    /// own candidates.
    ///
    /// # Errors
    ///
    /// Fails when the mesh BVH is missing.
    pub fn collide(
        &mut self,
        cache: &mut ObbCache,
        world_obb: &Obb,
        mesh: &TriMesh,
        mesh_world: &Isometry3<f64>,
    ) -> Result<(), CollideError> {
        let tree = mesh.tree().ok_or(CollideError::EmptyMesh)?;

        self.nb_bv_tests = 0;
        self.nb_prim_tests = 0;

        if self.temporal_coherence {
            if let Some(fat) = &cache.fat_obb {
                if fat.contains(world_obb) {
                    self.touched.clear();
                    self.touched.extend_from_slice(&cache.touched);
                    return Ok(());
                }
            }
            // Miss: descend with the fattened box so the stored list stays
            // valid for every box inside it, then keep the subset story
            // simple by reporting that same list.
            let fat = world_obb.fattened(cache.fat_coeff);
            self.init_query(&fat, mesh_world);
            self.touched.clear();
            self.descend(tree, mesh);
            cache.fat_obb = Some(fat);
            cache.touched.clear();
            cache.touched.extend_from_slice(&self.touched);
            return Ok(());
        }

        self.init_query(world_obb, mesh_world);
        self.touched.clear();
        self.descend(tree, mesh);
        Ok(())
    }

    /// Transform the query box into mesh-local space and precompute the
    /// absolute rotation for the node tests.
    fn init_query(&mut self, world_obb: &Obb, mesh_world: &Isometry3<f64>) {
        let inv = mesh_world.inverse();
        self.local_center = inv * world_obb.center;
        self.local_rot = inv.rotation.to_rotation_matrix().into_inner() * world_obb.rotation;
        self.local_extents = world_obb.extents;
        self.abs_rot = abs_rotation(&self.local_rot);
    }

    fn descend(&mut self, tree: &NoLeafTree, mesh: &TriMesh) {
        match tree.root() {
            NodeRef::Prim(p) => self.prim_test(mesh, p),
            NodeRef::Node(root) => self.descend_node(tree, mesh, root),
        }
    }

    fn descend_node(&mut self, tree: &NoLeafTree, mesh: &TriMesh, index: u32) {
        let node = tree.node(index);
        self.nb_bv_tests += 1;
        if !boxes_overlap_relative(
            &node.aabb.extents,
            &node.aabb.center,
            &self.local_extents,
            &Point3::origin(),
            &self.local_rot,
            &self.abs_rot,
            &self.local_center.coords,
        ) {
            return;
        }
        for child in [node.pos, node.neg] {
            match child {
                NodeRef::Prim(p) => self.prim_test(mesh, p),
                NodeRef::Node(n) => self.descend_node(tree, mesh, n),
            }
        }
    }

    /// Triangle-vs-box SAT in the query box's own frame.
    fn prim_test(&mut self, mesh: &TriMesh, prim: u32) {
        self.nb_prim_tests += 1;
        let inv_rot = self.local_rot.transpose();
        let tri = mesh
            .triangle(prim)
            .map(|v| Point3::from(inv_rot * (v - self.local_center)));
        let query = Aabb::new(Point3::origin(), self.local_extents);
        if tri_aabb_overlap(&tri, &query) {
            self.touched.push(prim);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mesh::unit_cube_mesh;
    use nalgebra::{Translation3, UnitQuaternion};

    fn identity() -> Isometry3<f64> {
        Isometry3::identity()
    }

    #[test]
    fn test_big_box_touches_everything() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        let obb = Obb::axis_aligned(Point3::origin(), Vector3::new(2.0, 2.0, 2.0));
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        let mut touched = collider.touched().to_vec();
        touched.sort_unstable();
        assert_eq!(touched, (0..12).collect::<Vec<u32>>());
    }

    #[test]
    fn test_far_box_touches_nothing() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        let obb = Obb::axis_aligned(Point3::new(10.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        assert!(!collider.contact_status());
        assert!(collider.nb_bv_tests() >= 1);
    }

    #[test]
    fn test_side_box_touches_one_face() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        // A thin box hugging the +X face from outside.
        let obb = Obb::axis_aligned(Point3::new(0.55, 0.0, 0.0), Vector3::new(0.1, 0.1, 0.1));
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        let touched = collider.touched();
        // The +X face triangles are indices 10 and 11; the other faces'
        // planes are at least 0.4 away from the box.
        assert!(touched.contains(&10));
        assert!(touched.contains(&11));
        assert_eq!(touched.len(), 2);
    }

    #[test]
    fn test_rotated_query_box() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        // A slab rotated 45 degrees about Z, reaching over the +X face.
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4)
            .to_rotation_matrix()
            .into_inner();
        let obb = Obb::new(Point3::new(0.9, 0.0, 0.0), Vector3::new(0.5, 0.1, 0.1), rot);
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        assert!(collider.contact_status());
    }

    #[test]
    fn test_mesh_world_transform_applies() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        let mesh_world = Isometry3::from_parts(
            Translation3::new(5.0, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        let near_origin = Obb::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        collider
            .collide(&mut cache, &near_origin, &mesh, &mesh_world)
            .unwrap();
        assert!(!collider.contact_status());

        let near_mesh = Obb::axis_aligned(Point3::new(5.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        collider
            .collide(&mut cache, &near_mesh, &mesh, &mesh_world)
            .unwrap();
        assert!(collider.contact_status());
    }

    #[test]
    fn test_cache_replay_inside_fattened_box() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        collider.set_temporal_coherence(true);
        let mut cache = ObbCache::new();

        let obb = Obb::axis_aligned(Point3::new(0.5, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5));
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        assert!(cache.is_primed());
        let first = collider.touched().to_vec();
        assert!(!first.is_empty());

        // A slightly smaller box at the same spot replays without BV tests.
        let smaller = Obb::axis_aligned(Point3::new(0.5, 0.0, 0.0), Vector3::new(0.45, 0.45, 0.45));
        collider
            .collide(&mut cache, &smaller, &mesh, &identity())
            .unwrap();
        assert_eq!(collider.nb_bv_tests(), 0);
        assert_eq!(collider.touched(), first.as_slice());

        // Moving well outside the fattened box descends again.
        let moved = Obb::axis_aligned(Point3::new(3.0, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5));
        collider.collide(&mut cache, &moved, &mesh, &identity()).unwrap();
        assert!(collider.nb_bv_tests() > 0);
    }

    #[test]
    fn test_without_temporal_coherence_cache_untouched() {
        let mesh = unit_cube_mesh();
        let mut collider = ObbCollider::new();
        let mut cache = ObbCache::new();
        let obb = Obb::axis_aligned(Point3::origin(), Vector3::new(2.0, 2.0, 2.0));
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        collider.collide(&mut cache, &obb, &mesh, &identity()).unwrap();
        assert!(collider.nb_bv_tests() > 0);
        assert!(!cache.is_primed());
    }
}
