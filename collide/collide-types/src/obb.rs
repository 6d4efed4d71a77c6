//! Oriented bounding box and separating-axis overlap tests.
//!
//! The OBB-OBB test is the classic 15-axis SAT (3 axes of A, 3 of B, 9 edge
//! cross products). Cross-product axes are evaluated against an
//! absolute-value rotation matrix fattened by a small epsilon, a strategy
//! borrowed from the RAPID library that keeps nearly-parallel boxes from
//! reporting phantom separations.

use nalgebra::{Matrix3, Point3, Vector3};

/// Epsilon added to every |R| entry before cross-axis tests (RAPID strategy).
const ABS_ROT_EPSILON: f64 = 1e-6;

/// Oriented bounding box: center + half-extents + rotation.
///
/// The rotation's columns are the box's local axes expressed in the parent
/// frame. Rotation + translation only; scale is not supported anywhere in
/// this kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    /// Box center in the parent frame.
    pub center: Point3<f64>,
    /// Half-extents along each local axis.
    pub extents: Vector3<f64>,
    /// Orientation: columns are the local axes.
    pub rotation: Matrix3<f64>,
}

impl Obb {
    /// Create an OBB from center, half-extents and rotation.
    #[must_use]
    pub const fn new(center: Point3<f64>, extents: Vector3<f64>, rotation: Matrix3<f64>) -> Self {
        Self {
            center,
            extents,
            rotation,
        }
    }

    /// Axis-aligned OBB (identity rotation).
    #[must_use]
    pub fn axis_aligned(center: Point3<f64>, extents: Vector3<f64>) -> Self {
        Self::new(center, extents, Matrix3::identity())
    }

    /// The box's local axis `i` in the parent frame.
    #[must_use]
    pub fn axis(&self, i: usize) -> Vector3<f64> {
        self.rotation.column(i).into_owned()
    }

    /// A copy with the extents scaled by `coeff` (used by the fattened
    /// traversal cache).
    #[must_use]
    pub fn fattened(&self, coeff: f64) -> Self {
        Self {
            center: self.center,
            extents: self.extents * coeff,
            rotation: self.rotation,
        }
    }

    /// The eight corners of the box in the parent frame.
    #[must_use]
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let e = self.extents;
        let signs = [
            Vector3::new(-e.x, -e.y, -e.z),
            Vector3::new(e.x, -e.y, -e.z),
            Vector3::new(e.x, e.y, -e.z),
            Vector3::new(-e.x, e.y, -e.z),
            Vector3::new(-e.x, -e.y, e.z),
            Vector3::new(e.x, -e.y, e.z),
            Vector3::new(e.x, e.y, e.z),
            Vector3::new(-e.x, e.y, e.z),
        ];
        signs.map(|s| self.center + self.rotation * s)
    }

    /// Check whether a point lies inside the box.
    #[must_use]
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        let local = self.rotation.transpose() * (point - self.center);
        local.x.abs() <= self.extents.x
            && local.y.abs() <= self.extents.y
            && local.z.abs() <= self.extents.z
    }

    /// Check whether `other` lies entirely inside this box.
    ///
    /// Exact for convex shapes: every corner of `other` must be contained.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.corners().iter().all(|c| self.contains_point(c))
    }

    /// 15-axis separating-axis overlap test against another OBB.
    ///
    /// Symmetric: `a.overlaps(&b) == b.overlaps(&a)` for well-conditioned
    /// rotations.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        // Everything in A's local frame, where A is axis-aligned at the
        // origin and B is described by the relative rotation/translation.
        let rot = self.rotation.transpose() * other.rotation;
        let trans = self.rotation.transpose() * (other.center - self.center);
        boxes_overlap_relative(
            &self.extents,
            &Point3::origin(),
            &other.extents,
            &Point3::origin(),
            &rot,
            &abs_rotation(&rot),
            &trans,
        )
    }
}

/// Component-wise `epsilon + |r|` of a rotation matrix.
///
/// The epsilon keeps cross-product axes from producing false separations
/// when two edges are nearly parallel.
#[must_use]
pub fn abs_rotation(rot: &Matrix3<f64>) -> Matrix3<f64> {
    rot.map(|v| ABS_ROT_EPSILON + v.abs())
}

/// Overlap test between an axis-aligned box A and a box B expressed in a
/// second frame, given the precomputed B-to-A rotation, its absolute form
/// and the B-to-A translation.
///
/// This is the inner loop of both tree traversals: the traversal computes
/// `rot`/`abs_rot`/`trans` once per query and feeds node centers/extents
/// straight from the BVH arrays.
///
/// Any axis showing positive separation returns `false`; projections that
/// merely touch count as overlapping.
#[must_use]
#[allow(clippy::many_single_char_names, clippy::similar_names)]
pub fn boxes_overlap_relative(
    ea: &Vector3<f64>,
    ca: &Point3<f64>,
    eb: &Vector3<f64>,
    cb: &Point3<f64>,
    rot: &Matrix3<f64>,
    abs_rot: &Matrix3<f64>,
    trans: &Vector3<f64>,
) -> bool {
    // B's center in A's frame, relative to A's center.
    let t = rot * cb.coords + trans - ca.coords;

    // Class I: A's basis vectors.
    for i in 0..3 {
        let ra = ea[i];
        let rb = abs_rot[(i, 0)] * eb.x + abs_rot[(i, 1)] * eb.y + abs_rot[(i, 2)] * eb.z;
        if t[i].abs() > ra + rb {
            return false;
        }
    }

    // Class II: B's basis vectors.
    for j in 0..3 {
        let proj = rot[(0, j)] * t.x + rot[(1, j)] * t.y + rot[(2, j)] * t.z;
        let ra = ea.x * abs_rot[(0, j)] + ea.y * abs_rot[(1, j)] + ea.z * abs_rot[(2, j)];
        let rb = eb[j];
        if proj.abs() > ra + rb {
            return false;
        }
    }

    // Class III: the nine cross products A_i x B_j.
    for i in 0..3 {
        let i1 = (i + 1) % 3;
        let i2 = (i + 2) % 3;
        for j in 0..3 {
            let j1 = (j + 1) % 3;
            let j2 = (j + 2) % 3;
            let proj = t[i2] * rot[(i1, j)] - t[i1] * rot[(i2, j)];
            let ra = ea[i1] * abs_rot[(i2, j)] + ea[i2] * abs_rot[(i1, j)];
            let rb = eb[j1] * abs_rot[(i, j2)] + eb[j2] * abs_rot[(i, j1)];
            if proj.abs() > ra + rb {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;
    use std::f64::consts::FRAC_PI_4;

    fn rotated(angle: f64) -> Matrix3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner()
    }

    #[test]
    fn test_identity_boxes_overlap() {
        let a = Obb::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let b = Obb::axis_aligned(Point3::new(1.5, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_separated_boxes() {
        let a = Obb::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let b = Obb::axis_aligned(Point3::new(5.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_rotated_diagonal_reach() {
        // A unit box rotated 45 degrees reaches sqrt(2) along X; it touches
        // a box whose near face sits at x = 2.3 only because of that.
        let a = Obb::new(
            Point3::origin(),
            Vector3::new(1.0, 1.0, 1.0),
            rotated(FRAC_PI_4),
        );
        let near = Obb::axis_aligned(Point3::new(2.3, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let far = Obb::axis_aligned(Point3::new(2.5, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(a.overlaps(&near));
        assert!(!a.overlaps(&far));
    }

    #[test]
    fn test_overlap_symmetry() {
        let cases = [
            (0.0, Point3::new(1.9, 0.3, -0.2)),
            (0.3, Point3::new(2.1, -0.4, 0.1)),
            (FRAC_PI_4, Point3::new(2.4, 0.0, 0.0)),
            (1.1, Point3::new(0.5, 0.5, 0.5)),
        ];
        let a = Obb::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        for (angle, center) in cases {
            let b = Obb::new(center, Vector3::new(0.8, 1.2, 0.6), rotated(angle));
            assert_eq!(a.overlaps(&b), b.overlaps(&a), "asymmetric at {angle}");
        }
    }

    #[test]
    fn test_contains_corners() {
        let outer = Obb::axis_aligned(Point3::origin(), Vector3::new(2.0, 2.0, 2.0));
        let inner = Obb::new(
            Point3::new(0.2, 0.1, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            rotated(0.2),
        );
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_fattened_contains_original() {
        let obb = Obb::new(
            Point3::new(1.0, 2.0, 3.0),
            Vector3::new(0.5, 0.25, 1.0),
            rotated(0.7),
        );
        assert!(obb.fattened(1.1).contains(&obb));
    }

    #[test]
    fn test_nearly_parallel_no_false_separation() {
        // Two boxes sharing a face, one rotated by a sub-epsilon angle.
        // Without the fattened |R| the cross axes can report separation.
        let a = Obb::axis_aligned(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let b = Obb::new(
            Point3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            rotated(1e-9),
        );
        assert!(a.overlaps(&b));
    }
}
