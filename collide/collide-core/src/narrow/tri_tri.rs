//! Triangle-triangle separating-axis tests and contact generation.
//!
//! Two entry levels:
//!
//! - [`tri_tri_overlap`] - the boolean test the tree-vs-tree traversal runs
//!   at leaf pairs. Face normals of both triangles plus the nine edge cross
//!   products; any separating axis ends the test.
//! - [`tri_tri_contact`] - the manifold-producing variant used by the
//!   mesh-vs-mesh narrow phase: tracks the minimum-overlap axis, then
//!   extracts contacts by clipping the incident triangle into the reference
//!   triangle's prism (face axes) or by the closest points of the two edges
//!   (edge-edge axes).
//!
//! [`tri_aabb_overlap`] is the triangle-vs-box test the traversal uses when
//! one descent side has already bottomed out in a triangle.

use nalgebra::{Isometry3, Point3, Vector3};
use smallvec::SmallVec;

use collide_types::{Aabb, CollideError, ContactAccumulator, ContactGeom, QueryFlags};

use super::{closest_params_on_lines, DEGENERATE_EPSILON};
use crate::mesh::{TriMesh, VertexSource};
use crate::tree_collider::{PairCache, TreeCollider};

/// Clip-polygon scratch: a triangle clipped by up to four planes has at
/// most seven vertices.
type ClipPoly = SmallVec<[Point3<f64>; 8]>;

/// Project three points onto an axis, returning (min, max).
fn project_tri(axis: &Vector3<f64>, tri: &[Point3<f64>; 3]) -> (f64, f64) {
    let p0 = axis.dot(&tri[0].coords);
    let p1 = axis.dot(&tri[1].coords);
    let p2 = axis.dot(&tri[2].coords);
    (p0.min(p1).min(p2), p0.max(p1).max(p2))
}

/// Boolean separating-axis test between two triangles.
///
/// Touching configurations (projection intervals that merely meet) count
/// as overlapping. Degenerate triangles never overlap anything.
#[must_use]
pub fn tri_tri_overlap(tri_a: &[Point3<f64>; 3], tri_b: &[Point3<f64>; 3]) -> bool {
    let edges_a = [
        tri_a[1] - tri_a[0],
        tri_a[2] - tri_a[1],
        tri_a[0] - tri_a[2],
    ];
    let edges_b = [
        tri_b[1] - tri_b[0],
        tri_b[2] - tri_b[1],
        tri_b[0] - tri_b[2],
    ];

    let normal_a = edges_a[0].cross(&edges_a[1]);
    let normal_b = edges_b[0].cross(&edges_b[1]);
    if normal_a.norm_squared() < DEGENERATE_EPSILON
        || normal_b.norm_squared() < DEGENERATE_EPSILON
    {
        return false;
    }

    let mut separated_on = |axis: &Vector3<f64>| -> bool {
        let (min_a, max_a) = project_tri(axis, tri_a);
        let (min_b, max_b) = project_tri(axis, tri_b);
        max_a < min_b || max_b < min_a
    };

    if separated_on(&normal_a) || separated_on(&normal_b) {
        return false;
    }

    for ea in &edges_a {
        for eb in &edges_b {
            let axis = ea.cross(eb);
            // Parallel edges produce a useless axis; the face normals
            // already cover that direction.
            if axis.norm_squared() < DEGENERATE_EPSILON {
                continue;
            }
            if separated_on(&axis) {
                return false;
            }
        }
    }

    true
}

/// Triangle vs centered AABB separating-axis test (13 axes).
///
/// Used by the tree-vs-tree descent when one side has bottomed out in a
/// triangle already transformed into the peer tree's frame.
#[must_use]
pub fn tri_aabb_overlap(tri: &[Point3<f64>; 3], aabb: &Aabb) -> bool {
    // Work relative to the box center so the box is symmetric about the
    // origin.
    let v = [
        tri[0] - aabb.center,
        tri[1] - aabb.center,
        tri[2] - aabb.center,
    ];
    let e = aabb.extents;

    // Box face axes: triangle bounds vs extents.
    for i in 0..3 {
        let min = v[0][i].min(v[1][i]).min(v[2][i]);
        let max = v[0][i].max(v[1][i]).max(v[2][i]);
        if min > e[i] || max < -e[i] {
            return false;
        }
    }

    let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];

    // Triangle face normal.
    let normal = edges[0].cross(&edges[1]);
    let dist = normal.dot(&v[0]);
    let radius = e.x * normal.x.abs() + e.y * normal.y.abs() + e.z * normal.z.abs();
    if dist.abs() > radius {
        return false;
    }

    // The nine box-axis x edge cross products. For box axis i the cross
    // only has components on the other two axes (a1, a2).
    for (a1, a2) in [(1usize, 2usize), (2, 0), (0, 1)] {
        for edge in &edges {
            let mut axis = Vector3::zeros();
            axis[a1] = -edge[a2];
            axis[a2] = edge[a1];
            if axis.norm_squared() < DEGENERATE_EPSILON {
                continue;
            }
            let p0 = axis.dot(&v[0]);
            let p1 = axis.dot(&v[1]);
            let p2 = axis.dot(&v[2]);
            let min = p0.min(p1).min(p2);
            let max = p0.max(p1).max(p2);
            let radius = e[a1] * axis[a1].abs() + e[a2] * axis[a2].abs();
            if min > radius || max < -radius {
                return false;
            }
        }
    }

    true
}

/// Which axis family produced the minimum overlap.
#[derive(Debug, Clone, Copy)]
enum AxisKind {
    /// Face normal of triangle A: A is the reference face.
    FaceA,
    /// Face normal of triangle B: B is the reference face.
    FaceB,
    /// Cross of edge `i` from A and edge `j` from B.
    EdgeEdge(usize, usize),
}

/// Generate contacts for an overlapping triangle pair.
///
/// The minimum-overlap axis is oriented from A toward B and becomes the
/// contact normal. Face axes clip the incident triangle into the reference
/// triangle's prism and emit one contact per clipped vertex inside the
/// overlap slab; edge-edge axes emit the midpoint of the closest edge
/// points. At least one contact is emitted for every overlapping,
/// non-degenerate pair.
pub fn tri_tri_contact(
    tri_a: &[Point3<f64>; 3],
    tri_b: &[Point3<f64>; 3],
    side1: i32,
    side2: i32,
    acc: &mut ContactAccumulator,
) {
    let edges_a = [
        tri_a[1] - tri_a[0],
        tri_a[2] - tri_a[1],
        tri_a[0] - tri_a[2],
    ];
    let edges_b = [
        tri_b[1] - tri_b[0],
        tri_b[2] - tri_b[1],
        tri_b[0] - tri_b[2],
    ];

    let mut normal_a = edges_a[0].cross(&edges_a[1]);
    let mut normal_b = edges_b[0].cross(&edges_b[1]);
    if !super::safe_normalize(&mut normal_a) || !super::safe_normalize(&mut normal_b) {
        return; // degenerate triangle: no contact, by contract
    }

    let mut best_overlap = f64::INFINITY;
    let mut best_axis = Vector3::zeros();
    let mut best_kind = AxisKind::FaceA;

    let mut test_axis = |axis: Vector3<f64>, kind: AxisKind,
                         best_overlap: &mut f64,
                         best_axis: &mut Vector3<f64>,
                         best_kind: &mut AxisKind|
     -> bool {
        let (min_a, max_a) = project_tri(&axis, tri_a);
        let (min_b, max_b) = project_tri(&axis, tri_b);
        if max_a < min_b || max_b < min_a {
            return false;
        }
        let overlap = (max_a.min(max_b) - min_a.max(min_b)).max(0.0);
        if overlap < *best_overlap {
            *best_overlap = overlap;
            *best_axis = axis;
            *best_kind = kind;
        }
        true
    };

    if !test_axis(
        normal_a,
        AxisKind::FaceA,
        &mut best_overlap,
        &mut best_axis,
        &mut best_kind,
    ) {
        return;
    }
    if !test_axis(
        normal_b,
        AxisKind::FaceB,
        &mut best_overlap,
        &mut best_axis,
        &mut best_kind,
    ) {
        return;
    }
    for (i, ea) in edges_a.iter().enumerate() {
        for (j, eb) in edges_b.iter().enumerate() {
            let mut axis = ea.cross(eb);
            if !super::safe_normalize(&mut axis) {
                continue;
            }
            if !test_axis(
                axis,
                AxisKind::EdgeEdge(i, j),
                &mut best_overlap,
                &mut best_axis,
                &mut best_kind,
            ) {
                return;
            }
        }
    }

    // Orient the contact normal from A toward B.
    let center_a = (tri_a[0].coords + tri_a[1].coords + tri_a[2].coords) / 3.0;
    let center_b = (tri_b[0].coords + tri_b[1].coords + tri_b[2].coords) / 3.0;
    if best_axis.dot(&(center_b - center_a)) < 0.0 {
        best_axis = -best_axis;
    }

    let emitted_before = acc.len();
    match best_kind {
        AxisKind::FaceA => {
            clip_face_contacts(tri_a, tri_b, &best_axis, side1, side2, acc);
        }
        AxisKind::FaceB => {
            // B is the reference face; clip A into B's prism. Depth is
            // still measured along the A->B normal.
            clip_face_contacts_reference_b(tri_b, tri_a, &best_axis, side1, side2, acc);
        }
        AxisKind::EdgeEdge(i, j) => {
            emit_edge_edge_contact(
                tri_a, &edges_a, tri_b, &edges_b, i, j, &best_axis, best_overlap, side1, side2,
                acc,
            );
        }
    }

    // Clipping can come up empty in grazing configurations; the overlap is
    // still real, so fall back to the deepest incident vertex.
    if acc.len() == emitted_before {
        let (_, max_a) = project_tri(&best_axis, tri_a);
        let mut deepest = tri_b[0];
        let mut best_d = f64::INFINITY;
        for v in tri_b {
            let d = best_axis.dot(&v.coords);
            if d < best_d {
                best_d = d;
                deepest = *v;
            }
        }
        acc.add(deepest, best_axis, (max_a - best_d).max(0.0), side1, side2);
    }
}

/// Clip `incident` into `reference`'s edge prism; emit one contact per
/// clipped vertex that lies inside the overlap slab along `normal`
/// (oriented reference -> incident).
fn clip_face_contacts(
    reference: &[Point3<f64>; 3],
    incident: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    side1: i32,
    side2: i32,
    acc: &mut ContactAccumulator,
) {
    let clipped = clip_to_edge_prism(reference, incident, normal);
    let (_, max_ref) = project_tri(normal, reference);
    for point in clipped {
        let depth = max_ref - normal.dot(&point.coords);
        if depth >= 0.0 {
            acc.add(point, *normal, depth, side1, side2);
            if acc.should_stop() {
                return;
            }
        }
    }
}

/// As [`clip_face_contacts`] but with B as the reference: the normal is
/// oriented A -> B, i.e. *toward* the reference, so the slab check flips.
fn clip_face_contacts_reference_b(
    reference: &[Point3<f64>; 3],
    incident: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    side1: i32,
    side2: i32,
    acc: &mut ContactAccumulator,
) {
    let clipped = clip_to_edge_prism(reference, incident, normal);
    let (min_ref, _) = project_tri(normal, reference);
    for point in clipped {
        let depth = normal.dot(&point.coords) - min_ref;
        if depth >= 0.0 {
            acc.add(point, *normal, depth, side1, side2);
            if acc.should_stop() {
                return;
            }
        }
    }
}

/// Sutherland-Hodgman clip of `poly` against the three edge planes of
/// `reference` (planes through each edge, parallel to `normal`, facing
/// inward).
fn clip_to_edge_prism(
    reference: &[Point3<f64>; 3],
    poly: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
) -> ClipPoly {
    let mut current: ClipPoly = poly.iter().copied().collect();
    for i in 0..3 {
        let p = reference[i];
        let q = reference[(i + 1) % 3];
        let r = reference[(i + 2) % 3];
        let mut plane_n = normal.cross(&(q - p));
        // Orient inward: the third vertex is inside.
        if plane_n.dot(&(r - p)) < 0.0 {
            plane_n = -plane_n;
        }
        let offset = plane_n.dot(&p.coords);
        current = clip_poly_to_plane(&current, &plane_n, offset);
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Clip a polygon to the half-space `dot(n, x) >= offset`.
fn clip_poly_to_plane(poly: &[Point3<f64>], n: &Vector3<f64>, offset: f64) -> ClipPoly {
    let mut out = ClipPoly::new();
    if poly.is_empty() {
        return out;
    }
    let mut prev = poly[poly.len() - 1];
    let mut prev_d = n.dot(&prev.coords) - offset;
    for &point in poly {
        let d = n.dot(&point.coords) - offset;
        if prev_d >= 0.0 {
            out.push(prev);
            if d < 0.0 {
                let t = prev_d / (prev_d - d);
                out.push(Point3::from(prev.coords.lerp(&point.coords, t)));
            }
        } else if d > 0.0 {
            let t = prev_d / (prev_d - d);
            out.push(Point3::from(prev.coords.lerp(&point.coords, t)));
        }
        prev = point;
        prev_d = d;
    }
    out
}

/// One contact at the midpoint of the closest points of the two winning
/// edges.
#[allow(clippy::too_many_arguments)]
fn emit_edge_edge_contact(
    tri_a: &[Point3<f64>; 3],
    edges_a: &[Vector3<f64>; 3],
    tri_b: &[Point3<f64>; 3],
    edges_b: &[Vector3<f64>; 3],
    i: usize,
    j: usize,
    normal: &Vector3<f64>,
    depth: f64,
    side1: i32,
    side2: i32,
    acc: &mut ContactAccumulator,
) {
    let pa = tri_a[i];
    let pb = tri_b[j];
    let mut da = edges_a[i];
    let mut db = edges_b[j];
    let len_a = da.norm();
    let len_b = db.norm();
    if len_a < DEGENERATE_EPSILON || len_b < DEGENERATE_EPSILON {
        return;
    }
    da /= len_a;
    db /= len_b;

    let (s, t) = match closest_params_on_lines(&pa, &da, &pb, &db) {
        Some(st) => st,
        None => (0.0, 0.0),
    };
    let point_a = pa + da * s.clamp(0.0, len_a);
    let point_b = pb + db * t.clamp(0.0, len_b);
    let mid = Point3::from((point_a.coords + point_b.coords) * 0.5);
    acc.add(mid, *normal, depth.max(0.0), side1, side2);
}

/// Mesh-vs-mesh narrow phase: run the tree collider for candidate triangle
/// pairs, then generate a deduplicated manifold in world space.
///
/// `side1` of every contact is the triangle in `mesh0`, `side2` the
/// triangle in `mesh1`.
///
/// # Errors
///
/// Propagates settings-validation and missing-tree errors from the
/// traversal.
#[allow(clippy::too_many_arguments)]
pub fn collide_trimesh_pair(
    collider: &mut TreeCollider,
    mesh0: &TriMesh,
    world0: &Isometry3<f64>,
    mesh1: &TriMesh,
    world1: &Isometry3<f64>,
    flags: QueryFlags,
    geom1: usize,
    geom2: usize,
    cache: Option<&mut PairCache>,
) -> Result<Vec<ContactGeom>, CollideError> {
    if !collider.collide(mesh0, world0, mesh1, world1, cache)? {
        return Ok(Vec::new());
    }

    let mut acc = ContactAccumulator::new(flags, geom1, geom2);
    for &(id0, id1) in collider.pairs() {
        let tri_a = mesh0.triangle(id0).map(|v| world0 * v);
        let tri_b = mesh1.triangle(id1).map(|v| world1 * v);
        #[allow(clippy::cast_possible_wrap)]
        tri_tri_contact(&tri_a, &tri_b, id0 as i32, id1 as i32, &mut acc);
        if acc.should_stop() {
            break;
        }
    }
    Ok(acc.into_contacts())
}
