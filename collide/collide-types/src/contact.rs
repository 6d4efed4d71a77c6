//! Contact record and manifold accumulation.
//!
//! All narrow-phase generators emit through [`ContactAccumulator`], which
//! owns the cap, duplicate-suppression and depth-replacement rules. The
//! record layout is `#[repr(C)]` so callers sharing the struct across an
//! ABI boundary see a stable layout.

use nalgebra::{Point3, Vector3};

use crate::QueryFlags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two contacts closer than this (per component of the math below) are
/// considered the same point.
const SAME_POSITION_EPSILON: f64 = 1e-4;

/// Two normals whose dot product is within this of +/-1 are considered
/// parallel.
const SAME_NORMAL_EPSILON: f64 = 1e-4;

/// A single contact point.
///
/// `side1` carries the triangle index in the mesh; `side2` is `-1` unless
/// both sides are mesh primitives (triangle-triangle), in which case it is
/// the peer triangle index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactGeom {
    /// Contact position in world space.
    pub pos: Point3<f64>,
    /// Unit contact normal.
    pub normal: Vector3<f64>,
    /// Penetration depth (non-negative).
    pub depth: f64,
    /// First geometry reference (the mesh side).
    pub geom1: usize,
    /// Second geometry reference.
    pub geom2: usize,
    /// Primitive index on the first side.
    pub side1: i32,
    /// Primitive index on the second side, or -1.
    pub side2: i32,
}

/// Bounded contact sink with the duplicate-suppression semantics shared by
/// every generator.
///
/// Without the "unimportant" flag, a new contact matching an existing one in
/// both position and normal direction only replaces that contact's depth if
/// deeper; the scan past the cap exists exactly so those replacements can
/// still happen. With the flag set, the caller has promised it does not care
/// which contacts survive, and generators may stop at the cap.
#[derive(Debug)]
pub struct ContactAccumulator {
    contacts: Vec<ContactGeom>,
    flags: QueryFlags,
    geom1: usize,
    geom2: usize,
}

impl ContactAccumulator {
    /// Create an accumulator for a geometry pair.
    #[must_use]
    pub fn new(flags: QueryFlags, geom1: usize, geom2: usize) -> Self {
        Self {
            contacts: Vec::with_capacity(flags.max_contacts),
            flags,
            geom1,
            geom2,
        }
    }

    /// The query flags this accumulator was configured with.
    #[must_use]
    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    /// Number of contacts currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// True when no contact has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// True when the generator may stop scanning: the cap is reached *and*
    /// the caller flagged contacts as unimportant.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.flags.unimportant && self.contacts.len() >= self.flags.max_contacts
    }

    /// Emit a contact, applying dedup / cap / replacement rules.
    pub fn add(
        &mut self,
        pos: Point3<f64>,
        normal: Vector3<f64>,
        depth: f64,
        side1: i32,
        side2: i32,
    ) {
        // Numerical safety mirrors the rest of the pipeline: a NaN depth
        // becomes zero rather than poisoning comparisons downstream.
        let depth = if depth.is_finite() { depth } else { 0.0 };

        if !self.flags.unimportant {
            let mut duplicate = false;
            for existing in &mut self.contacts {
                let dpos = pos - existing.pos;
                if dpos.norm_squared() < SAME_POSITION_EPSILON * SAME_POSITION_EPSILON
                    && 1.0 - normal.dot(&existing.normal).abs() < SAME_NORMAL_EPSILON
                {
                    if depth > existing.depth {
                        existing.depth = depth;
                    }
                    duplicate = true;
                    // No break: a later near-duplicate may deepen more than
                    // one close pair, matching the reference generator.
                }
            }
            if duplicate || self.contacts.len() >= self.flags.max_contacts {
                return;
            }
        } else {
            debug_assert!(self.contacts.len() < self.flags.max_contacts);
            if self.contacts.len() >= self.flags.max_contacts {
                return;
            }
        }

        self.contacts.push(ContactGeom {
            pos,
            normal,
            depth,
            geom1: self.geom1,
            geom2: self.geom2,
            side1,
            side2,
        });
    }

    /// Consume the accumulator and return the manifold.
    #[must_use]
    pub fn into_contacts(self) -> Vec<ContactGeom> {
        self.contacts
    }

    /// Borrow the contacts emitted so far.
    #[must_use]
    pub fn contacts(&self) -> &[ContactGeom] {
        &self.contacts
    }
}
