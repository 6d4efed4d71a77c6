//! Narrow-phase contact generators.
//!
//! Each generator takes candidate triangles from a mid-phase traversal and
//! emits contacts through the shared
//! [`ContactAccumulator`](collide_types::ContactAccumulator), which owns
//! the cap / dedup / replacement rules. Degenerate triangles (near-zero
//! edge cross product) silently produce no contact; meshes are validated
//! at build time, but a rigid transform can still collapse a sliver
//! triangle numerically.

mod box_tri;
mod capsule_tri;
mod tri_tri;

pub use box_tri::{collide_trimesh_box, BoxTriCollider};
pub use capsule_tri::{collide_trimesh_capsule, CapsuleTriCollider};
pub use tri_tri::{collide_trimesh_pair, tri_aabb_overlap, tri_tri_contact, tri_tri_overlap};

use nalgebra::{Point3, Vector3};

/// Near-zero guard shared by the SAT generators.
pub(crate) const DEGENERATE_EPSILON: f64 = 1e-12;

/// Normalize in place; `false` (vector untouched) when the length is
/// negligible.
pub(crate) fn safe_normalize(v: &mut Vector3<f64>) -> bool {
    let len_sq = v.norm_squared();
    if len_sq < DEGENERATE_EPSILON {
        return false;
    }
    *v /= len_sq.sqrt();
    true
}

/// Closest parameters of two infinite lines `p1 + s*d1`, `p2 + t*d2` with
/// unit directions. Returns `None` for (near-)parallel lines.
pub(crate) fn closest_params_on_lines(
    p1: &Point3<f64>,
    d1: &Vector3<f64>,
    p2: &Point3<f64>,
    d2: &Vector3<f64>,
) -> Option<(f64, f64)> {
    let uaub = d1.dot(d2);
    let denom = 1.0 - uaub * uaub;
    if denom <= DEGENERATE_EPSILON {
        return None;
    }
    let inv = 1.0 / denom;
    let p = p2 - p1;
    let q1 = d1.dot(&p);
    let q2 = -d2.dot(&p);
    Some(((q1 + uaub * q2) * inv, (uaub * q1 + q2) * inv))
}
