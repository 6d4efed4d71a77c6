//! Ray-vs-tree collider and the ray narrow phase.
//!
//! The traversal stabs the no-leaf BVH with a segment (the ray clipped to
//! its maximum distance), culling nodes with a slab + cross-axis
//! segment-AABB test, and runs the Möller ray-triangle intersection at
//! leaves. Hits carry the distance and barycentric coordinates.
//!
//! Modes: *closest hit* keeps only the nearest face, *first contact* stops
//! at the first accepted face, otherwise every stabbed face is reported.
//! Backface culling is a separate toggle that feeds the Möller determinant
//! test.

use nalgebra::{Isometry3, Point3, Vector3};

use collide_types::{CollideError, ContactGeom, QueryFlags};

use crate::bvh::{NoLeafTree, NodeRef};
use crate::mesh::{TriMesh, VertexSource};

/// Möller determinant guard, scaled by the squared edge lengths.
const LOCAL_EPSILON: f64 = 1e-6;

/// One stabbed face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Index of the touched triangle.
    pub face: u32,
    /// Distance from the ray origin to the hit point.
    pub distance: f64,
    /// Barycentric U at the hit.
    pub u: f64,
    /// Barycentric V at the hit.
    pub v: f64,
}

/// Collider for a ray (segment) against one mesh BVH.
#[derive(Debug)]
pub struct RayCollider {
    // Settings
    closest_hit: bool,
    first_contact: bool,
    culling: bool,
    max_dist: f64,

    // Per-query ray, in mesh-local space.
    origin: Point3<f64>,
    dir: Vector3<f64>,
    /// Segment half-vector (dir * max_dist / 2).
    half: Vector3<f64>,
    /// Segment midpoint.
    mid: Point3<f64>,
    /// Component-wise |half|.
    fhalf: Vector3<f64>,

    hits: Vec<RayHit>,
    done: bool,

    // Stats
    nb_ray_bv_tests: usize,
    nb_ray_prim_tests: usize,
    nb_intersections: usize,
}

impl Default for RayCollider {
    fn default() -> Self {
        Self::new()
    }
}

impl RayCollider {
    /// Create a collider reporting every stabbed face, no culling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            closest_hit: false,
            first_contact: false,
            culling: false,
            max_dist: f64::MAX,
            origin: Point3::origin(),
            dir: Vector3::zeros(),
            half: Vector3::zeros(),
            mid: Point3::origin(),
            fhalf: Vector3::zeros(),
            hits: Vec::new(),
            done: false,
            nb_ray_bv_tests: 0,
            nb_ray_prim_tests: 0,
            nb_intersections: 0,
        }
    }

    /// Report only the closest hit.
    pub fn set_closest_hit(&mut self, flag: bool) {
        self.closest_hit = flag;
    }

    /// Stop at the first accepted hit.
    pub fn set_first_contact(&mut self, flag: bool) {
        self.first_contact = flag;
    }

    /// Reject back-facing triangles in the Möller test.
    pub fn set_culling(&mut self, flag: bool) {
        self.culling = flag;
    }

    /// Upper distance bound: the ray becomes a segment.
    pub fn set_max_dist(&mut self, max_dist: f64) {
        self.max_dist = max_dist;
    }

    /// Validate the settings combination.
    ///
    /// # Errors
    ///
    /// Closest-hit and first-contact answer different questions with the
    /// same storage; the combination is refused.
    pub fn validate_settings(&self) -> Result<(), CollideError> {
        if self.closest_hit && self.first_contact {
            return Err(CollideError::invalid_settings(
                "closest-hit does not work with first-contact mode",
            ));
        }
        Ok(())
    }

    /// Faces stabbed by the last query.
    #[must_use]
    pub fn hits(&self) -> &[RayHit] {
        &self.hits
    }

    /// Whether the last query stabbed any face.
    #[must_use]
    pub fn contact_status(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Number of segment-vs-node tests in the last query.
    #[must_use]
    pub fn nb_ray_bv_tests(&self) -> usize {
        self.nb_ray_bv_tests
    }

    /// Number of ray-triangle tests in the last query.
    #[must_use]
    pub fn nb_ray_prim_tests(&self) -> usize {
        self.nb_ray_prim_tests
    }

    /// Number of accepted intersections in the last query (usable for
    /// inside/outside tests on closed meshes).
    #[must_use]
    pub fn nb_intersections(&self) -> usize {
        self.nb_intersections
    }

    /// Stab the mesh with a world-space ray.
    ///
    /// `direction` must be unit length. Returns the contact status.
    ///
    /// # Errors
    ///
    /// Fails on inconsistent settings or a mesh whose BVH is missing.
    pub fn collide(
        &mut self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        mesh: &TriMesh,
        mesh_world: &Isometry3<f64>,
    ) -> Result<bool, CollideError> {
        self.validate_settings()?;
        debug_assert!(
            (direction.norm() - 1.0).abs() < 1e-6,
            "ray direction must be unit length"
        );
        let tree = mesh.tree().ok_or(CollideError::EmptyMesh)?;

        // Ray into mesh-local space.
        let inv = mesh_world.inverse();
        self.origin = inv * origin;
        self.dir = inv.rotation.to_rotation_matrix().into_inner() * direction;

        self.half = self.dir * (0.5 * self.max_dist);
        self.mid = self.origin + self.half;
        self.fhalf = self.half.map(f64::abs);

        self.hits.clear();
        self.done = false;
        self.nb_ray_bv_tests = 0;
        self.nb_ray_prim_tests = 0;
        self.nb_intersections = 0;

        match tree.root() {
            NodeRef::Prim(p) => self.prim_stab(mesh, p),
            NodeRef::Node(root) => self.segment_stab(tree, mesh, root),
        }

        Ok(self.contact_status())
    }

    fn segment_stab(&mut self, tree: &NoLeafTree, mesh: &TriMesh, index: u32) {
        let node = tree.node(index);
        self.nb_ray_bv_tests += 1;
        if !self.segment_aabb_overlap(&node.aabb.center, &node.aabb.extents) {
            return;
        }
        let (pos, neg) = (node.pos, node.neg);
        match pos {
            NodeRef::Prim(p) => self.prim_stab(mesh, p),
            NodeRef::Node(n) => self.segment_stab(tree, mesh, n),
        }
        if self.done {
            return;
        }
        match neg {
            NodeRef::Prim(p) => self.prim_stab(mesh, p),
            NodeRef::Node(n) => self.segment_stab(tree, mesh, n),
        }
    }

    /// Segment vs centered AABB: slab distances plus the three
    /// cross-product axes of the segment direction.
    fn segment_aabb_overlap(&self, center: &Point3<f64>, extents: &Vector3<f64>) -> bool {
        let d = self.mid - center;

        if d.x.abs() > extents.x + self.fhalf.x {
            return false;
        }
        if d.y.abs() > extents.y + self.fhalf.y {
            return false;
        }
        if d.z.abs() > extents.z + self.fhalf.z {
            return false;
        }

        let f = self.half.y * d.z - self.half.z * d.y;
        if f.abs() > extents.y * self.fhalf.z + extents.z * self.fhalf.y {
            return false;
        }
        let f = self.half.z * d.x - self.half.x * d.z;
        if f.abs() > extents.x * self.fhalf.z + extents.z * self.fhalf.x {
            return false;
        }
        let f = self.half.x * d.y - self.half.y * d.x;
        if f.abs() > extents.x * self.fhalf.y + extents.y * self.fhalf.x {
            return false;
        }

        true
    }

    /// Möller ray-triangle test against one leaf.
    fn prim_stab(&mut self, mesh: &TriMesh, prim: u32) {
        self.nb_ray_prim_tests += 1;
        let [v0, v1, v2] = mesh.triangle(prim);

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let pvec = self.dir.cross(&edge2);
        let det = edge1.dot(&pvec);

        // Degenerate or edge-on triangles make the determinant collapse;
        // the guard scales with the smaller squared edge.
        let guard = LOCAL_EPSILON * edge1.norm_squared().min(edge2.norm_squared());
        if self.culling {
            if det <= guard {
                return;
            }
        } else if det.abs() <= guard {
            return;
        }

        let inv_det = 1.0 / det;
        let tvec = self.origin - v0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return;
        }

        let qvec = tvec.cross(&edge1);
        let v = self.dir.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return;
        }

        let t = edge2.dot(&qvec) * inv_det;
        // Negative distance means the face lies behind the origin.
        if t < 0.0 || t > self.max_dist {
            return;
        }

        self.nb_intersections += 1;
        let hit = RayHit {
            face: prim,
            distance: t,
            u,
            v,
        };

        if self.closest_hit {
            match self.hits.first() {
                Some(best) if best.distance <= t => {}
                _ => {
                    self.hits.clear();
                    self.hits.push(hit);
                }
            }
        } else {
            self.hits.push(hit);
            if self.first_contact {
                self.done = true;
            }
        }
    }
}

/// Ray narrow phase: stab the mesh and convert accepted hits to contacts.
///
/// The contact position is `origin + direction * t` in world space, the
/// normal is the triangle's geometric normal oriented toward the side the
/// ray came from, and the depth is the hit distance.
/// An optional callback filters faces by `(face, u, v)` before emission;
/// triangles that degenerate under the mesh transform are skipped.
///
/// # Errors
///
/// Propagates settings-validation and missing-tree errors.
#[allow(clippy::too_many_arguments)]
pub fn collide_trimesh_ray(
    collider: &mut RayCollider,
    mesh: &TriMesh,
    mesh_world: &Isometry3<f64>,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    length: f64,
    flags: QueryFlags,
    geom1: usize,
    geom2: usize,
    mut ray_callback: Option<&mut dyn FnMut(u32, f64, f64) -> bool>,
) -> Result<Vec<ContactGeom>, CollideError> {
    collider.set_max_dist(length);
    if !collider.collide(origin, direction, mesh, mesh_world)? {
        return Ok(Vec::new());
    }

    let mut contacts = Vec::new();
    for hit in collider.hits() {
        if let Some(callback) = ray_callback.as_deref_mut() {
            if !callback(hit.face, hit.u, hit.v) {
                continue;
            }
        }

        let [v0, v1, v2] = mesh.triangle(hit.face).map(|v| mesh_world * v);
        let mut normal = (v1 - v0).cross(&(v2 - v0));
        if !crate::narrow::safe_normalize(&mut normal) {
            continue; // degenerate under transform
        }
        // Report the side the ray came from.
        if normal.dot(direction) > 0.0 {
            normal = -normal;
        }

        #[allow(clippy::cast_possible_wrap)]
        contacts.push(ContactGeom {
            pos: origin + direction * hit.distance,
            normal,
            depth: hit.distance,
            geom1,
            geom2,
            side1: hit.face as i32,
            side2: -1,
        });
        if contacts.len() >= flags.max_contacts {
            break;
        }
    }
    Ok(contacts)
}
