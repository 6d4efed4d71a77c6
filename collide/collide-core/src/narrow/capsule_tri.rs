//! Capsule-triangle SAT contact generator.
//!
//! Nineteen candidate separating axes: the triangle normal, the capsule
//! axis crossed with each edge, the `((cap - vertex) x edge) x edge`
//! family for both cap centers, and the cap-to-vertex directions. Edge and
//! vertex axis families are gated by the triangle's feature flags so
//! contacts are not duplicated on features shared with a coplanar
//! neighbour. As in the box generator, non-face axes carry a 1.5 bias.
//!
//! Orientation pre-pass: the signed distance of the capsule center to the
//! triangle plane rejects back-side approaches outright when the test is
//! single-sided (closed meshes), or flips the winding so the SAT sees a
//! front face.
//!
//! Contact extraction clips the capsule's core segment, shifted by the
//! radius along the contact normal, against the triangle plane and the
//! three edge planes; the clipped endpoints become up to two contacts.
//! A final pass merges near-coincident contacts, keeping the deeper one.
//!
//! Contact normals point from the capsule toward the triangle.

use nalgebra::{Isometry3, Point3, Vector3};

use collide_types::{CollideError, ContactGeom, Obb, QueryFlags, TriFlags};

use super::{safe_normalize, DEGENERATE_EPSILON};
use crate::mesh::{TriMesh, VertexSource};
use crate::obb_collider::{ObbCache, ObbCollider};

/// Bias factor penalizing non-face axes.
const EDGE_BIAS: f64 = 1.5;

/// Contacts closer than this per component are merged.
const SAME_CONTACT_POSITION_EPSILON: f64 = 1e-4;

/// Normal components closer than this per component count as the same
/// direction.
const SAME_CONTACT_NORMAL_EPSILON: f64 = 1e-4;

/// A contact kept locally until the merge pass runs.
#[derive(Debug, Clone, Copy)]
struct LocalContact {
    pos: Point3<f64>,
    normal: Vector3<f64>,
    depth: f64,
    tri_index: u32,
    keep: bool,
}

/// Query state for one capsule against a stream of triangles.
#[derive(Debug)]
pub struct CapsuleTriCollider {
    // Capsule in world space.
    pos: Point3<f64>,
    axis: Vector3<f64>,
    size_on_axis: Vector3<f64>,
    radius: f64,
    cap_size: f64,

    // Per-triangle SAT state.
    contact_normal: Vector3<f64>,
    best_depth: f64,
    best_center_rt: f64,
    best_axis: i32,
    tri_normal: Vector3<f64>,
    e0: Vector3<f64>,
    e1: Vector3<f64>,
    e2: Vector3<f64>,
    v0r: Vector3<f64>,
    v1r: Vector3<f64>,
    v2r: Vector3<f64>,

    max_contacts: usize,
    local: Vec<LocalContact>,
}

impl CapsuleTriCollider {
    /// Create a collider for a capsule given by its center, unit axis,
    /// cylinder half-length and radius.
    #[must_use]
    pub fn new(
        pos: Point3<f64>,
        axis: Vector3<f64>,
        half_length: f64,
        radius: f64,
        max_contacts: usize,
    ) -> Self {
        debug_assert!((axis.norm() - 1.0).abs() < 1e-6, "capsule axis must be unit");
        Self {
            pos,
            axis,
            size_on_axis: axis * half_length,
            radius,
            cap_size: half_length + radius,
            contact_normal: Vector3::zeros(),
            best_depth: f64::MIN,
            best_center_rt: 0.0,
            best_axis: 0,
            tri_normal: Vector3::zeros(),
            e0: Vector3::zeros(),
            e1: Vector3::zeros(),
            e2: Vector3::zeros(),
            v0r: Vector3::zeros(),
            v1r: Vector3::zeros(),
            v2r: Vector3::zeros(),
            max_contacts: max_contacts.max(1),
            local: Vec::new(),
        }
    }

    /// Number of local contacts collected so far.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.local.len()
    }

    /// True once the local buffer has reached the contact cap.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.local.len() >= self.max_contacts
    }

    /// SAT interval test for one axis; `axis` must be unit length.
    fn test_axis(&mut self, axis: Vector3<f64>, id: i32) -> bool {
        let p0 = self.v0r.dot(&axis);
        let p1 = self.v1r.dot(&axis);
        let p2 = self.v2r.dot(&axis);
        let min = p0.min(p1).min(p2);
        let max = p0.max(p1).max(p2);

        let center = (min + max) * 0.5;
        let tri_radius = max - center;
        let cap_radius = self.size_on_axis.dot(&axis).abs() + self.radius;

        let depth = center.abs() - (cap_radius + tri_radius);
        if depth > 0.0 {
            return false;
        }

        // Depths are negative; shallower (closer to zero) wins, and a
        // non-face axis must beat the best by the bias factor.
        if depth * EDGE_BIAS > self.best_depth {
            self.best_depth = depth;
            self.best_axis = id;
            if center < 0.0 {
                self.contact_normal = -axis;
                self.best_center_rt = -center - tri_radius;
            } else {
                self.contact_normal = axis;
                self.best_center_rt = center - tri_radius;
            }
        }
        true
    }

    /// The face axis seeds the best-axis state unconditionally.
    fn test_normal(&mut self, axis: Vector3<f64>, id: i32) -> bool {
        let p0 = self.v0r.dot(&axis);
        let p1 = self.v1r.dot(&axis);
        let p2 = self.v2r.dot(&axis);
        let min = p0.min(p1).min(p2);
        let max = p0.max(p1).max(p2);

        let center = (min + max) * 0.5;
        let tri_radius = max - center;
        let cap_radius = self.size_on_axis.dot(&axis).abs() + self.radius;

        let depth = center.abs() - (cap_radius + tri_radius);
        if depth > 0.0 {
            return false;
        }

        self.best_depth = depth;
        self.best_axis = id;
        self.contact_normal = axis;
        self.best_center_rt = center - tri_radius;
        true
    }

    /// `((a - b) x c) x d`, normalized. `None` when the result collapses.
    fn feature_axis(
        a: &Point3<f64>,
        b: &Point3<f64>,
        c: &Vector3<f64>,
        d: &Vector3<f64>,
    ) -> Option<Vector3<f64>> {
        let mut axis = (a - b).cross(c).cross(d);
        safe_normalize(&mut axis).then_some(axis)
    }

    /// All nineteen axes, gated by the triangle's feature flags.
    fn test_separating_axes(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        flags: TriFlags,
    ) -> bool {
        self.v0r = v0 - self.pos;
        self.v1r = v1 - self.pos;
        self.v2r = v2 - self.pos;

        self.best_axis = 0;
        self.best_depth = f64::MIN;

        // Axis 1: the (negated) triangle normal.
        if !self.test_normal(-self.tri_normal, 1) {
            return false;
        }

        if flags.is_empty() {
            return true;
        }

        let cap0 = self.pos + self.size_on_axis;
        let cap1 = self.pos - self.size_on_axis;

        if flags.contains(TriFlags::EDGE0) {
            let mut axis = self.axis.cross(&self.e0);
            if safe_normalize(&mut axis) && !self.test_axis(axis, 2) {
                return false;
            }
            if let Some(axis) = Self::feature_axis(&cap1, v0, &self.e0, &self.e0) {
                if !self.test_axis(axis, 8) {
                    return false;
                }
            }
            if let Some(axis) = Self::feature_axis(&cap0, v0, &self.e0, &self.e0) {
                if !self.test_axis(axis, 5) {
                    return false;
                }
            }
        }

        if flags.contains(TriFlags::EDGE1) {
            let mut axis = self.axis.cross(&self.e1);
            if safe_normalize(&mut axis) && !self.test_axis(axis, 3) {
                return false;
            }
            if let Some(axis) = Self::feature_axis(&cap0, v1, &self.e1, &self.e1) {
                if !self.test_axis(axis, 6) {
                    return false;
                }
            }
            if let Some(axis) = Self::feature_axis(&cap1, v1, &self.e1, &self.e1) {
                if !self.test_axis(axis, 9) {
                    return false;
                }
            }
        }

        if flags.contains(TriFlags::EDGE2) {
            let mut axis = self.axis.cross(&self.e2);
            if safe_normalize(&mut axis) && !self.test_axis(axis, 4) {
                return false;
            }
            if let Some(axis) = Self::feature_axis(&cap0, v2, &self.e2, &self.e2) {
                if !self.test_axis(axis, 7) {
                    return false;
                }
            }
            if let Some(axis) = Self::feature_axis(&cap1, v2, &self.e2, &self.e2) {
                if !self.test_axis(axis, 10) {
                    return false;
                }
            }
        }

        if flags.contains(TriFlags::VERT0) {
            if let Some(axis) = Self::feature_axis(v0, &cap0, &self.axis, &self.axis) {
                if !self.test_axis(axis, 11) {
                    return false;
                }
            }
            let mut axis = v0 - cap0;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 14) {
                return false;
            }
            let mut axis = v0 - cap1;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 17) {
                return false;
            }
        }

        if flags.contains(TriFlags::VERT1) {
            if let Some(axis) = Self::feature_axis(v1, &cap0, &self.axis, &self.axis) {
                if !self.test_axis(axis, 12) {
                    return false;
                }
            }
            let mut axis = v1 - cap0;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 15) {
                return false;
            }
            let mut axis = v1 - cap1;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 18) {
                return false;
            }
        }

        if flags.contains(TriFlags::VERT2) {
            if let Some(axis) = Self::feature_axis(v2, &cap0, &self.axis, &self.axis) {
                if !self.test_axis(axis, 13) {
                    return false;
                }
            }
            let mut axis = v2 - cap0;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 16) {
                return false;
            }
            let mut axis = v2 - cap1;
            if safe_normalize(&mut axis) && !self.test_axis(axis, 19) {
                return false;
            }
        }

        true
    }

    /// Clip the segment to the half-space `dot(n, p) + offset >= 0`.
    ///
    /// Returns `false` when the whole segment lies behind the plane.
    fn clip_segment(
        p0: &mut Vector3<f64>,
        p1: &mut Vector3<f64>,
        n: &Vector3<f64>,
        offset: f64,
    ) -> bool {
        let d0 = p0.dot(n) + offset;
        let d1 = p1.dot(n) + offset;
        if d0 < DEGENERATE_EPSILON && d1 < DEGENERATE_EPSILON {
            return false;
        }
        if d0 >= 0.0 && d1 >= 0.0 {
            return true;
        }
        let factor = d0 / (d0 - d1);
        let clipped = p0.lerp(p1, factor);
        if d0 < 0.0 {
            *p0 = clipped;
        } else {
            *p1 = clipped;
        }
        true
    }

    /// Test one triangle (world-space vertices) and stash its contacts.
    pub fn collide_triangle(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        tri_index: u32,
        mut flags: TriFlags,
        single_sided: bool,
    ) {
        self.e0 = v1 - v0;
        self.e1 = v2 - v1;
        self.e2 = v0 - v2;

        let mut n = self.e0.cross(&self.e1);
        // Clean meshes can still present degenerate triangles after the
        // rigid transform collapses a sliver.
        if !safe_normalize(&mut n) {
            return;
        }
        self.tri_normal = n;

        let dist_to_plane = self.pos.coords.dot(&n) - v0.coords.dot(&n);

        // Back-side approach: interior for closed surfaces.
        if dist_to_plane < 0.0 && single_sided {
            return;
        }
        if dist_to_plane > self.cap_size {
            return;
        }

        let (p0, p1, p2);
        if dist_to_plane < 0.0 {
            if dist_to_plane < -self.cap_size {
                return;
            }
            // Flip the winding so the SAT sees a front face; all feature
            // axes come back on because the flipped triangle is synthetic.
            p0 = *v0;
            p1 = *v2;
            p2 = *v1;
            self.tri_normal = -self.tri_normal;
            self.e0 = v2 - v0;
            self.e1 = v1 - v2;
            self.e2 = v0 - v1;
            flags = TriFlags::ALL;
        } else {
            p0 = *v0;
            p1 = *v1;
            p2 = *v2;
        }

        if !self.test_separating_axes(&p0, &p1, &p2, flags) {
            return;
        }
        if self.best_axis == 0 {
            debug_assert!(false, "no axis recorded despite overlap");
            return;
        }

        // Capsule core segment, shifted to the surface along the contact
        // normal, in coordinates relative to p0.
        let surface = self.pos + self.contact_normal * self.radius;
        let mut ep0 = (surface + self.size_on_axis) - p0;
        let mut ep1 = (surface - self.size_on_axis) - p0;

        let minus_n = -self.tri_normal;
        if !Self::clip_segment(&mut ep0, &mut ep1, &minus_n, 0.0) {
            return;
        }
        let plane0 = self.tri_normal.cross(&self.e0);
        if !Self::clip_segment(&mut ep0, &mut ep1, &plane0, 0.0) {
            return;
        }
        let plane1 = self.tri_normal.cross(&self.e1);
        let offset = -self.e0.dot(&plane1);
        if !Self::clip_segment(&mut ep0, &mut ep1, &plane1, offset) {
            return;
        }
        let plane2 = self.tri_normal.cross(&self.e2);
        if !Self::clip_segment(&mut ep0, &mut ep1, &plane2, 0.0) {
            return;
        }

        let w0 = p0 + ep0;
        let depth0 = ((w0 - self.pos).dot(&self.contact_normal) - self.best_center_rt).max(0.0);
        let w1 = p0 + ep1;
        let depth1 = ((w1 - self.pos).dot(&self.contact_normal) - self.best_center_rt).max(0.0);

        self.local.push(LocalContact {
            pos: w0,
            normal: self.contact_normal,
            depth: depth0,
            tri_index,
            keep: true,
        });
        if self.local.len() < self.max_contacts {
            self.local.push(LocalContact {
                pos: w1,
                normal: self.contact_normal,
                depth: depth1,
                tri_index,
                keep: true,
            });
        }
    }

    /// Merge near-coincident contacts, keeping the deeper of each pair.
    fn optimize(&mut self) {
        let count = self.local.len();
        for i in 0..count.saturating_sub(1) {
            for j in (i + 1)..count {
                let a = self.local[i];
                let b = self.local[j];
                let dpos = a.pos - b.pos;
                let pos_near = dpos.x.abs() < SAME_CONTACT_POSITION_EPSILON
                    && dpos.y.abs() < SAME_CONTACT_POSITION_EPSILON
                    && dpos.z.abs() < SAME_CONTACT_POSITION_EPSILON;
                let dnorm = a.normal - b.normal;
                let dir_near = dnorm.x.abs() < SAME_CONTACT_NORMAL_EPSILON
                    && dnorm.y.abs() < SAME_CONTACT_NORMAL_EPSILON
                    && dnorm.z.abs() < SAME_CONTACT_NORMAL_EPSILON;
                if pos_near && dir_near {
                    if b.depth > a.depth {
                        self.local[i].keep = false;
                    } else {
                        self.local[j].keep = false;
                    }
                }
            }
        }
    }

    /// Run the merge pass and emit up to the cap.
    fn drain(&mut self, flags: QueryFlags, geom1: usize, geom2: usize) -> Vec<ContactGeom> {
        if self.local.len() > 1 && !flags.unimportant {
            self.optimize();
        }
        let mut out = Vec::new();
        for c in &self.local {
            if out.len() >= flags.max_contacts {
                break;
            }
            if c.keep {
                #[allow(clippy::cast_possible_wrap)]
                out.push(ContactGeom {
                    pos: c.pos,
                    normal: c.normal,
                    depth: c.depth,
                    geom1,
                    geom2,
                    side1: c.tri_index as i32,
                    side2: -1,
                });
            }
        }
        out
    }
}

/// Capsule narrow phase: OBB candidates from the mid phase, per-triangle
/// SAT, then the near-contact merge pass.
///
/// The capsule is aligned with the local Z axis of `capsule_pose`;
/// `half_length` is the cylinder part. The test turns single-sided when
/// the mesh is a closed surface, or when the capsule is thin relative to
/// every mesh extent (1.5 x radius below each AABB half-extent would keep
/// it double-sided).
///
/// # Errors
///
/// Fails when the mesh BVH is missing.
#[allow(clippy::too_many_arguments)]
pub fn collide_trimesh_capsule(
    obb_collider: &mut ObbCollider,
    obb_cache: &mut ObbCache,
    mesh: &TriMesh,
    mesh_world: &Isometry3<f64>,
    capsule_pose: &Isometry3<f64>,
    half_length: f64,
    radius: f64,
    flags: QueryFlags,
    geom1: usize,
    geom2: usize,
) -> Result<Vec<ContactGeom>, CollideError> {
    let rot = capsule_pose.rotation.to_rotation_matrix().into_inner();
    let axis = rot.column(2).into_owned();
    let center = Point3::from(capsule_pose.translation.vector);
    let cap_size = half_length + radius;

    // Candidate query: the capsule's bounding OBB.
    let obb = Obb::new(
        center,
        Vector3::new(radius, radius, cap_size),
        rot,
    );
    obb_collider.collide(obb_cache, &obb, mesh, mesh_world)?;
    if !obb_collider.contact_status() {
        return Ok(Vec::new());
    }

    // Single-sided unless the mesh is open and large enough in every
    // dimension that the capsule could legitimately reach a back face.
    let mut single_sided = true;
    if !mesh.is_closed_surface() {
        let size = 1.5 * radius;
        let ext = mesh.aabb().extents;
        if size < ext.x || size < ext.y || size < ext.z {
            single_sided = false;
        }
    }

    let candidates: Vec<u32> = obb_collider.touched().to_vec();
    let mut collider = CapsuleTriCollider::new(center, axis, half_length, radius, flags.max_contacts);

    for &tri_index in &candidates {
        let [v0, v1, v2] = mesh.triangle(tri_index).map(|v| mesh_world * v);
        let tri_flags = mesh.tri_flags(tri_index);
        collider.collide_triangle(&v0, &v1, &v2, tri_index, tri_flags, single_sided);
        if collider.is_full() {
            break;
        }
    }

    Ok(collider.drain(flags, geom1, geom2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mesh::{unit_cube_mesh, TriMesh};
    use nalgebra::{Translation3, UnitQuaternion};

    fn identity() -> Isometry3<f64> {
        Isometry3::identity()
    }

    /// Capsule (radius 0.25, length 1.0) at the origin, axis Z, over a
    /// triangle in the y = 0 plane.
    fn scenario_mesh() -> TriMesh {
        TriMesh::new(
            vec![
                Point3::new(-1.0, 0.0, -0.5),
                Point3::new(1.0, 0.0, -0.5),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_capsule_through_triangle_plane() {
        let mesh = scenario_mesh();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();

        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &identity(),
            0.5,
            0.25,
            QueryFlags::new(4),
            0,
            1,
        )
        .unwrap();

        assert!(!contacts.is_empty());
        for c in &contacts {
            assert!(c.normal.dot(&Vector3::y()) > 0.0, "normal {:?}", c.normal);
            assert!(c.depth > 0.0);
            assert!(c.depth <= 0.25 + 1e-9);
            assert_eq!(c.side1, 0);
            assert_eq!(c.side2, -1);
        }
    }

    #[test]
    fn test_capsule_above_plane_misses() {
        let mesh = scenario_mesh();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 2.0, 0.0),
            UnitQuaternion::identity(),
        );
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &pose,
            0.5,
            0.25,
            QueryFlags::new(4),
            0,
            1,
        )
        .unwrap();
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_capsule_resting_on_cube_top() {
        // Horizontal capsule lying across the top face of the unit cube.
        let mesh = unit_cube_mesh();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.7),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
        );
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &pose,
            0.5,
            0.25,
            QueryFlags::new(8),
            0,
            1,
        )
        .unwrap();

        assert!(!contacts.is_empty());
        assert!(contacts.iter().all(|c| c.depth >= 0.0));
        // The top-face contacts dominate: normal from the capsule down
        // into the cube, depth equal to the 0.05 overlap.
        assert!(contacts
            .iter()
            .any(|c| c.normal.z < -0.9 && (c.depth - 0.05).abs() < 1e-6));
    }

    #[test]
    fn test_closed_surface_is_single_sided() {
        // A capsule fully inside a closed cube touches only back faces;
        // single-sided culling drops everything.
        let mesh = unit_cube_mesh().with_closed_surface();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &identity(),
            0.1,
            0.1,
            QueryFlags::new(8),
            0,
            1,
        )
        .unwrap();
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_open_surface_back_side_contact() {
        // The triangle's winding normal points -Y; a capsule on the +Y
        // side approaches the back face. The mesh is open and thin along
        // Y, so the test stays double-sided and the winding flip produces
        // contacts facing the capsule.
        let mesh = scenario_mesh();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.1, 0.0),
            UnitQuaternion::identity(),
        );
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &pose,
            0.5,
            0.25,
            QueryFlags::new(4),
            0,
            1,
        )
        .unwrap();
        assert!(!contacts.is_empty());
        for c in &contacts {
            // Approaching from -Y: the normal flips to face that side.
            assert!(c.normal.y < 0.0, "normal {:?}", c.normal);
        }
    }

    #[test]
    fn test_edge_flags_suppress_axes() {
        // With all feature axes disabled only the face axis runs; the
        // configuration still produces a face contact.
        let mesh = scenario_mesh().with_tri_flags(vec![TriFlags::NONE]);
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &identity(),
            0.5,
            0.25,
            QueryFlags::new(4),
            0,
            1,
        )
        .unwrap();
        assert!(!contacts.is_empty());
    }

    #[test]
    fn test_contact_cap() {
        let mesh = unit_cube_mesh();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.7),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
        );
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &pose,
            0.5,
            0.25,
            QueryFlags::new(2),
            0,
            1,
        )
        .unwrap();
        assert!(contacts.len() <= 2);
    }

    #[test]
    fn test_degenerate_triangle_ignored() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        let mut obb_collider = ObbCollider::new();
        let mut obb_cache = ObbCache::new();
        let contacts = collide_trimesh_capsule(
            &mut obb_collider,
            &mut obb_cache,
            &mesh,
            &identity(),
            &identity(),
            0.5,
            0.25,
            QueryFlags::new(4),
            0,
            1,
        )
        .unwrap();
        assert!(contacts.is_empty());
    }
}
