//! Core types for the collide collision kernel.
//!
//! This crate provides the foundational geometric types shared by the
//! collision pipeline:
//!
//! - [`Aabb`] - Axis-aligned bounding box stored as center + half-extents
//! - [`Obb`] - Oriented bounding box with a full separating-axis overlap test
//! - [`ContactGeom`] - The stable contact record emitted by all generators
//! - [`ContactAccumulator`] - Cap, deduplication and replacement semantics
//! - [`QueryFlags`] - Contact cap + "unimportant contacts" packing
//! - [`TriFlags`] - Per-triangle feature gates for the SAT generators
//! - [`CollideError`] - Error type for build and settings failures
//!
//! # Design Philosophy
//!
//! These types are **pure data plus local math**. They know nothing about
//! meshes, trees or broad phases; they're the common language between the
//! traversal code, the narrow-phase generators and the callers that consume
//! contact manifolds.
//!
//! # Coordinate System
//!
//! Right-handed, Z-up, consistent with the rest of the ecosystem. All
//! scalars are `f64`.

#![doc(html_root_url = "https://docs.rs/collide-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,   // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,       // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,     // Error docs added where non-obvious
)]

mod aabb;
mod contact;
mod error;
mod flags;
mod obb;

pub use aabb::Aabb;
pub use contact::{ContactAccumulator, ContactGeom};
pub use error::CollideError;
pub use flags::{QueryFlags, TriFlags};
pub use obb::{abs_rotation, boxes_overlap_relative, Obb};

// Re-export math types for convenience
pub use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for collision operations.
pub type Result<T> = std::result::Result<T, CollideError>;
