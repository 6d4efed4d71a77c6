//! Axis-aligned bounding box stored as center + half-extents.
//!
//! The center/extents form is what the BVH nodes store: the overlap test
//! against another centered box is three subtractions and three compares,
//! and refitting converts from min/max once per node.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box as center + half-extents.
///
/// Unlike the min/max representation, the overlap test between two centered
/// boxes needs no corner reconstruction: `|ca - cb| <= ea + eb` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Box center.
    pub center: Point3<f64>,
    /// Half-extents along each axis. All components are non-negative for a
    /// well-formed box.
    pub extents: Vector3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            extents: Vector3::zeros(),
        }
    }
}

impl Aabb {
    /// Create an AABB from center and half-extents.
    #[must_use]
    pub const fn new(center: Point3<f64>, extents: Vector3<f64>) -> Self {
        Self { center, extents }
    }

    /// Create an AABB from min and max corners.
    #[must_use]
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            center: Point3::from((min.coords + max.coords) * 0.5),
            extents: (max - min) * 0.5,
        }
    }

    /// Tight bounds of a triangle.
    #[must_use]
    pub fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        let min = Point3::new(
            v0.x.min(v1.x).min(v2.x),
            v0.y.min(v1.y).min(v2.y),
            v0.z.min(v1.z).min(v2.z),
        );
        let max = Point3::new(
            v0.x.max(v1.x).max(v2.x),
            v0.y.max(v1.y).max(v2.y),
            v0.z.max(v1.z).max(v2.z),
        );
        Self::from_min_max(min, max)
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Point3<f64> {
        self.center - self.extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Point3<f64> {
        self.center + self.extents
    }

    /// Overlap test against another centered box. Touching boxes (equality
    /// on any axis) count as overlapping.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let d = self.center - other.center;
        let e = self.extents + other.extents;
        d.x.abs() <= e.x && d.y.abs() <= e.y && d.z.abs() <= e.z
    }

    /// Check whether `other` lies entirely inside this box.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        let self_min = self.min();
        let self_max = self.max();
        let other_min = other.min();
        let other_max = other.max();
        self_min.x <= other_min.x
            && self_min.y <= other_min.y
            && self_min.z <= other_min.z
            && self_max.x >= other_max.x
            && self_max.y >= other_max.y
            && self_max.z >= other_max.z
    }

    /// Component-wise union of two boxes.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let min_a = self.min();
        let max_a = self.max();
        let min_b = other.min();
        let max_b = other.max();
        Self::from_min_max(
            Point3::new(
                min_a.x.min(min_b.x),
                min_a.y.min(min_b.y),
                min_a.z.min(min_b.z),
            ),
            Point3::new(
                max_a.x.max(max_b.x),
                max_a.y.max(max_b.y),
                max_a.z.max(max_b.z),
            ),
        )
    }

    /// Check validity: non-negative extents, finite components.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.center.coords.iter().all(|c| c.is_finite())
            && self.extents.iter().all(|e| e.is_finite() && *e >= 0.0)
    }
}
