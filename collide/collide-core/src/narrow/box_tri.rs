//! Box-triangle SAT contact generator.
//!
//! Thirteen candidate separating axes: the triangle's face normal, the
//! box's three face axes, and the nine box-axis x triangle-edge cross
//! products. The triangle-normal test is one-sided: it only declares
//! separation on the outward side of the face. A box on the back side is
//! either separated by the remaining two-sided axes or, when it genuinely
//! straddles interior geometry, pushed back out through the front - the
//! behavior solid meshes want.
//!
//! Edge axes carry a 1.5 depth bias before they may replace the best axis:
//! face contacts produce stabler manifolds, so an edge axis must win
//! clearly to be preferred.
//!
//! Contact extraction depends on the winning axis:
//! - triangle normal: the box's most anti-parallel face is clipped into
//!   the triangle's prism, one contact per surviving corner;
//! - box face: the triangle is clipped against the face's four side
//!   planes, one contact per surviving vertex;
//! - edge x edge: the closest points of the two lines yield a single
//!   contact at their midpoint.
//!
//! Contact normals point from the box toward the mesh surface.

use nalgebra::{Isometry3, Matrix3, Point3, Vector3};
use smallvec::SmallVec;

use collide_types::{CollideError, ContactAccumulator, ContactGeom, Obb, QueryFlags};

use super::{closest_params_on_lines, safe_normalize, DEGENERATE_EPSILON};
use crate::mesh::{TriMesh, VertexSource};
use crate::obb_collider::{ObbCache, ObbCollider};

/// Bias factor that makes edge axes lose ties against face axes.
const EDGE_BIAS: f64 = 1.5;

/// Clip scratch: a quad or triangle clipped by up to five planes.
type ClipPoly = SmallVec<[Vector3<f64>; 9]>;

/// Query state for one box against a stream of triangles.
///
/// The box is fixed at construction; [`BoxTriCollider::collide_triangle`]
/// is called once per candidate triangle with vertices in the same frame
/// as the box (the driver uses world space).
#[derive(Debug)]
pub struct BoxTriCollider {
    box_pos: Point3<f64>,
    box_half: Vector3<f64>,
    /// Columns are the box axes.
    box_rot: Matrix3<f64>,

    // Per-triangle SAT state.
    best_normal: Vector3<f64>,
    best_depth: f64,
    best_axis: i32,
    e0: Vector3<f64>,
    e1: Vector3<f64>,
    e2: Vector3<f64>,
    n_norm: Vector3<f64>,
}

impl BoxTriCollider {
    /// Create a collider for a box given by center, half-extents and
    /// rotation (columns are the axes).
    #[must_use]
    pub fn new(box_pos: Point3<f64>, box_half: Vector3<f64>, box_rot: Matrix3<f64>) -> Self {
        Self {
            box_pos,
            box_half,
            box_rot,
            best_normal: Vector3::zeros(),
            best_depth: f64::MAX,
            best_axis: 0,
            e0: Vector3::zeros(),
            e1: Vector3::zeros(),
            e2: Vector3::zeros(),
            n_norm: Vector3::zeros(),
        }
    }

    fn axis(&self, i: usize) -> Vector3<f64> {
        self.box_rot.column(i).into_owned()
    }

    /// Test one triangle and emit contacts for it.
    ///
    /// Returns `true` when the triangle intersects the box. Degenerate
    /// triangles produce no contact.
    pub fn collide_triangle(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        tri_index: u32,
        acc: &mut ContactAccumulator,
    ) -> bool {
        if !self.test_separating_axes(v0, v1, v2) {
            return false;
        }
        if self.best_axis > 0 {
            self.clip_contacts(v0, v1, v2, tri_index, acc);
            return true;
        }
        false
    }

    /// Triangle-normal axis: one-sided. Rejects only when the box lies
    /// entirely on the face's outward side.
    fn test_normal(&mut self, depth: f64, normal: Vector3<f64>) -> bool {
        if depth < DEGENERATE_EPSILON {
            return false;
        }
        if depth < self.best_depth {
            self.best_normal = -normal;
            self.best_axis = 1;
            self.best_depth = depth;
        }
        true
    }

    /// Box face axis: two-sided interval test. When the deeper overlap is
    /// on the negative side the normal flips.
    fn test_face(
        &mut self,
        fp0: f64,
        fp1: f64,
        fp2: f64,
        radius: f64,
        normal: Vector3<f64>,
        axis: i32,
    ) -> bool {
        let (depth, depth_max) = if fp0 < fp1 {
            let depth = radius - fp0.min(fp2);
            if depth < 0.0 {
                return false;
            }
            (depth, radius + fp1.max(fp2))
        } else {
            let depth = radius - fp1.min(fp2);
            if depth < 0.0 {
                return false;
            }
            (depth, radius + fp0.max(fp2))
        };
        if depth_max < 0.0 {
            return false;
        }

        if depth > depth_max {
            // Deeper overlap on the negative side.
            if depth_max < self.best_depth {
                self.best_normal = -normal;
                self.best_axis = axis;
                self.best_depth = depth_max;
            }
        } else if depth < self.best_depth {
            self.best_normal = normal;
            self.best_axis = axis;
            self.best_depth = depth;
        }
        true
    }

    /// Cross-product axis. The axis arrives unnormalized; depth gets
    /// normalized and the 1.5 bias applied before comparison.
    fn test_edge(&mut self, fp0: f64, fp1: f64, radius: f64, normal: Vector3<f64>, axis: i32) -> bool {
        let (depth_min, depth_max) = if fp0 < fp1 {
            let depth_min = radius - fp0;
            if depth_min < 0.0 {
                return false;
            }
            (depth_min, radius + fp1)
        } else {
            let depth_min = radius - fp1;
            if depth_min < 0.0 {
                return false;
            }
            (depth_min, radius + fp0)
        };
        if depth_max < 0.0 {
            return false;
        }

        let len_sq = normal.norm_squared();
        if len_sq <= DEGENERATE_EPSILON {
            // Parallel edge and axis: useless direction, covered elsewhere.
            return true;
        }
        let inv_len = 1.0 / len_sq.sqrt();

        let (depth, sign) = if depth_min > depth_max {
            (depth_max * inv_len, -1.0)
        } else {
            (depth_min * inv_len, 1.0)
        };
        if depth * EDGE_BIAS < self.best_depth {
            self.best_normal = normal * (sign * inv_len);
            self.best_axis = axis;
            self.best_depth = depth;
        }
        true
    }

    /// Run all thirteen axes. `false` means separated (or degenerate).
    fn test_separating_axes(&mut self, v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> bool {
        self.best_axis = 0;
        self.best_depth = f64::MAX;

        self.e0 = v1 - v0;
        self.e1 = v2 - v0;

        let n = self.e0.cross(&self.e1);
        // A triangle may degenerate into a segment under the mesh
        // transform even when the source data is clean.
        let n_len_sq = n.norm_squared();
        if n_len_sq < DEGENERATE_EPSILON {
            return false;
        }
        self.n_norm = n / n_len_sq.sqrt();

        let a0 = self.axis(0);
        let a1 = self.axis(1);
        let a2 = self.axis(2);
        let (h0, h1, h2) = (self.box_half.x, self.box_half.y, self.box_half.z);

        let v0d = v0 - self.box_pos;

        // Axis 1: triangle normal.
        let fp0 = self.n_norm.dot(&v0d);
        let radius = h0 * self.n_norm.dot(&a0).abs()
            + h1 * self.n_norm.dot(&a1).abs()
            + h2 * self.n_norm.dot(&a2).abs();
        if !self.test_normal(fp0 + radius, self.n_norm) {
            self.best_axis = -1;
            return false;
        }

        // Axes 2-4: box faces.
        let a0_e0 = a0.dot(&self.e0);
        let a0_e1 = a0.dot(&self.e1);
        let fp0 = a0.dot(&v0d);
        if !self.test_face(fp0, fp0 + a0_e0, fp0 + a0_e1, h0, a0, 2) {
            self.best_axis = -2;
            return false;
        }

        let a1_e0 = a1.dot(&self.e0);
        let a1_e1 = a1.dot(&self.e1);
        let fp0 = a1.dot(&v0d);
        if !self.test_face(fp0, fp0 + a1_e0, fp0 + a1_e1, h1, a1, 3) {
            self.best_axis = -3;
            return false;
        }

        let a2_e0 = a2.dot(&self.e0);
        let a2_e1 = a2.dot(&self.e1);
        let fp0 = a2.dot(&v0d);
        if !self.test_face(fp0, fp0 + a2_e0, fp0 + a2_e1, h2, a2, 4) {
            self.best_axis = -4;
            return false;
        }

        // Axes 5-13: box axis x triangle edge. Projections of the other
        // two vertices follow from dot(a_i, n) because the axis is
        // orthogonal to its own edge.
        self.e2 = self.e1 - self.e0;
        let a0_n = a0.dot(&n);
        let a1_n = a1.dot(&n);
        let a2_n = a2.dot(&n);
        let a0_e2 = a0.dot(&self.e2);
        let a1_e2 = a1.dot(&self.e2);
        let a2_e2 = a2.dot(&self.e2);

        let edge_axes: [(Vector3<f64>, f64, f64, i32); 9] = [
            // (axis, second-interval-end delta, projected box radius, id)
            (a0.cross(&self.e0), a0_n, h1 * a2_e0.abs() + h2 * a1_e0.abs(), 5),
            (a0.cross(&self.e1), -a0_n, h1 * a2_e1.abs() + h2 * a1_e1.abs(), 6),
            (a0.cross(&self.e2), -a0_n, h1 * a2_e2.abs() + h2 * a1_e2.abs(), 7),
            (a1.cross(&self.e0), a1_n, h0 * a2_e0.abs() + h2 * a0_e0.abs(), 8),
            (a1.cross(&self.e1), -a1_n, h0 * a2_e1.abs() + h2 * a0_e1.abs(), 9),
            (a1.cross(&self.e2), -a1_n, h0 * a2_e2.abs() + h2 * a0_e2.abs(), 10),
            (a2.cross(&self.e0), a2_n, h0 * a1_e0.abs() + h1 * a0_e0.abs(), 11),
            (a2.cross(&self.e1), -a2_n, h0 * a1_e1.abs() + h1 * a0_e1.abs(), 12),
            (a2.cross(&self.e2), -a2_n, h0 * a1_e2.abs() + h1 * a0_e2.abs(), 13),
        ];
        for (axis_vec, delta, radius, id) in edge_axes {
            let fp0 = axis_vec.dot(&v0d);
            let fp_other = fp0 + delta;
            if !self.test_edge(fp0, fp_other, radius, axis_vec, id) {
                self.best_axis = -id;
                return false;
            }
        }

        true
    }

    /// Contact extraction for the winning axis.
    fn clip_contacts(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        tri_index: u32,
        acc: &mut ContactAccumulator,
    ) {
        #[allow(clippy::cast_possible_wrap)]
        let side1 = tri_index as i32;

        if self.best_axis > 4 {
            self.edge_edge_contact(v0, v1, v2, side1, acc);
        } else if self.best_axis == 1 {
            self.triangle_face_contacts(v0, v1, v2, side1, acc);
        } else {
            self.box_face_contacts(v0, v1, v2, side1, acc);
        }
    }

    /// Edge-edge: closest points of the box edge and the triangle edge.
    fn edge_edge_contact(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        side1: i32,
        acc: &mut ContactAccumulator,
    ) {
        // Walk from the box center to the edge most aligned with the
        // contact normal.
        let mut pa = self.box_pos;
        for i in 0..3 {
            let axis = self.axis(i);
            let sign = if self.best_normal.dot(&axis) > 0.0 { 1.0 } else { -1.0 };
            pa += axis * (sign * self.box_half[i]);
        }

        let decomposed = self.best_axis - 5;
        let box_axis = self.axis((decomposed / 3) as usize);
        let (pb, mut edge_dir) = match decomposed % 3 {
            0 => (*v0, self.e0),
            1 => (*v2, self.e1),
            _ => (*v1, self.e2),
        };
        if !safe_normalize(&mut edge_dir) {
            return;
        }

        if let Some((s, t)) = closest_params_on_lines(&pa, &box_axis, &pb, &edge_dir) {
            let point_a = pa + box_axis * s;
            let point_b = pb + edge_dir * t;
            let pos = Point3::from((point_a.coords + point_b.coords) * 0.5);
            acc.add(pos, self.best_normal, self.best_depth, side1, -1);
        } else {
            // Parallel edges: fall back to the box edge point.
            acc.add(pa, self.best_normal, self.best_depth, side1, -1);
        }
    }

    /// Triangle is the reference face: project the box's most
    /// anti-parallel face and clip it by the triangle's prism.
    fn triangle_face_contacts(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        side1: i32,
        acc: &mut ContactAccumulator,
    ) {
        // Contact normal in box coordinates, pointing from triangle to box.
        let nr = -(self.box_rot.transpose() * self.best_normal);
        let abs_nr = nr.map(f64::abs);

        // Box axis most aligned with the normal picks the face; the other
        // two order its corners.
        let (ib0, ib1, ib2) = if abs_nr.y > abs_nr.x {
            if abs_nr.y > abs_nr.z {
                (1, 0, 2)
            } else {
                (2, 0, 1)
            }
        } else if abs_nr.x > abs_nr.z {
            (0, 1, 2)
        } else {
            (2, 0, 1)
        };

        // Everything below works relative to v0.
        let mut center = self.box_pos - v0;
        let face_sign = if nr[ib0] > 0.0 { -1.0 } else { 1.0 };
        center += self.axis(ib0) * (face_sign * self.box_half[ib0]);

        let u = self.axis(ib1) * self.box_half[ib1];
        let w = self.axis(ib2) * self.box_half[ib2];
        let corners: [Vector3<f64>; 4] =
            [center + u - w, center - u - w, center - u + w, center + u + w];

        // Clip the face quad by the triangle plane and its three edge
        // planes (all through v0 in these coordinates except the middle
        // edge).
        let mut poly: ClipPoly = corners.iter().copied().collect();

        poly = clip_poly(&poly, &(-self.n_norm), 0.0);

        let mut p0 = self.n_norm.cross(&(v1 - v0));
        if safe_normalize(&mut p0) {
            poly = clip_poly(&poly, &p0, 0.0);
        }

        let mut p1 = self.n_norm.cross(&(v2 - v1));
        if safe_normalize(&mut p1) {
            // The middle edge plane does not pass through v0; its offset is
            // the distance from v0's side.
            let offset = (v0 - v2).dot(&p1);
            poly = clip_poly(&poly, &p1, offset);
        }

        let mut p2 = self.n_norm.cross(&(v0 - v2));
        if safe_normalize(&mut p2) {
            poly = clip_poly(&poly, &p2, 0.0);
        }

        for point in &poly {
            let depth = self.best_normal.dot(point).max(0.0);
            let pos = v0 + *point;
            acc.add(pos, self.best_normal, depth, side1, -1);
            if acc.should_stop() {
                return;
            }
        }
    }

    /// A box face is the reference: clip the triangle against the face
    /// slab and four side planes.
    fn box_face_contacts(
        &mut self,
        v0: &Point3<f64>,
        v1: &Point3<f64>,
        v2: &Point3<f64>,
        side1: i32,
        acc: &mut ContactAccumulator,
    ) {
        let ia0 = (self.best_axis - 2) as usize;
        let (ia1, ia2) = match ia0 {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        };

        // Triangle in box-centered coordinates.
        let mut poly: ClipPoly = SmallVec::new();
        poly.push(v0 - self.box_pos);
        poly.push(v1 - self.box_pos);
        poly.push(v2 - self.box_pos);

        poly = clip_poly(&poly, &(-self.best_normal), self.box_half[ia0]);

        let rot_a1 = self.axis(ia1);
        poly = clip_poly(&poly, &rot_a1, self.box_half[ia1]);
        poly = clip_neg_poly(&poly, &rot_a1, self.box_half[ia1]);

        let rot_a2 = self.axis(ia2);
        poly = clip_poly(&poly, &rot_a2, self.box_half[ia2]);
        poly = clip_neg_poly(&poly, &rot_a2, self.box_half[ia2]);

        for point in &poly {
            let depth = (self.box_half[ia0] - self.best_normal.dot(point)).max(0.0);
            let pos = self.box_pos + *point;
            acc.add(pos, self.best_normal, depth, side1, -1);
            if acc.should_stop() {
                return;
            }
        }
    }
}

/// Clip to `dot(n, p) + offset >= 0`.
fn clip_poly(poly: &[Vector3<f64>], n: &Vector3<f64>, offset: f64) -> ClipPoly {
    let mut out = ClipPoly::new();
    if poly.is_empty() {
        return out;
    }
    let mut prev = poly[poly.len() - 1];
    let mut prev_d = n.dot(&prev) + offset;
    for &point in poly {
        let d = n.dot(&point) + offset;
        if prev_d >= 0.0 {
            out.push(prev);
            if d < 0.0 {
                let t = prev_d / (prev_d - d);
                out.push(prev.lerp(&point, t));
            }
        } else if d > 0.0 {
            let t = prev_d / (prev_d - d);
            out.push(prev.lerp(&point, t));
        }
        prev = point;
        prev_d = d;
    }
    out
}

/// Clip to `-dot(n, p) + offset >= 0`, i.e. the opposite side.
fn clip_neg_poly(poly: &[Vector3<f64>], n: &Vector3<f64>, offset: f64) -> ClipPoly {
    clip_poly(poly, &-n, offset)
}

/// Box narrow phase: OBB candidates from the mid phase, then per-triangle
/// SAT.
///
/// `box_obb` is the box in world space. The optional array callback sees
/// the candidate triangle list once, before any SAT runs. The scan keeps
/// going past the contact cap unless the flags mark contacts unimportant,
/// so deeper duplicates can still replace emitted ones.
///
/// # Errors
///
/// Fails when the mesh BVH is missing.
#[allow(clippy::too_many_arguments)]
pub fn collide_trimesh_box(
    obb_collider: &mut ObbCollider,
    obb_cache: &mut ObbCache,
    mesh: &TriMesh,
    mesh_world: &Isometry3<f64>,
    box_obb: &Obb,
    flags: QueryFlags,
    geom1: usize,
    geom2: usize,
    mut array_callback: Option<&mut dyn FnMut(&[u32])>,
) -> Result<Vec<ContactGeom>, CollideError> {
    obb_collider.collide(obb_cache, box_obb, mesh, mesh_world)?;
    if !obb_collider.contact_status() {
        return Ok(Vec::new());
    }

    // Move the candidate list out so the collider can be reused freely.
    let candidates: Vec<u32> = obb_collider.touched().to_vec();
    if let Some(callback) = array_callback.as_deref_mut() {
        callback(&candidates);
    }

    let mut collider = BoxTriCollider::new(box_obb.center, box_obb.extents, box_obb.rotation);
    let mut acc = ContactAccumulator::new(flags, geom1, geom2);

    for &tri_index in &candidates {
        let [v0, v1, v2] = mesh.triangle(tri_index).map(|v| mesh_world * v);
        collider.collide_triangle(&v0, &v1, &v2, tri_index, &mut acc);
        if acc.should_stop() {
            break;
        }
    }

    Ok(acc.into_contacts())
}
