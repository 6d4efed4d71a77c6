//! Mesh-aware collision kernel.
//!
//! This crate is the collision core of a rigid-body pipeline: a compact
//! bounding-volume hierarchy over triangle meshes, the traversals that
//! query it, the mesh-primitive narrow-phase contact generators, and a
//! loose quadtree broad phase for 2.5-D scenes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     broad phase (QuadTree)                   │
//! │     per-geom residency, dirty list, pair callbacks           │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ (mesh, other geom) pairs
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   mid phase: NoLeafTree + ObbCollider / RayCollider /        │
//! │   TreeCollider  →  candidate triangles / triangle pairs      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ candidate indices
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   narrow phase: triangle-triangle / box-triangle /           │
//! │   capsule-triangle SAT  →  deduplicated contact manifold     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The BVH is built once per mesh and *refit* in place when the mesh
//! deforms: vertices are always fetched through the [`VertexSource`]
//! indirection, never copied into the tree.
//!
//! # Numerical model
//!
//! All math is `f64` under the default IEEE-754 round-to-nearest mode; the
//! kernel neither reads nor writes FPU control state. Transforms are
//! rotation + translation only; scale is not supported.

#![doc(html_root_url = "https://docs.rs/collide-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::neg_cmp_op_on_partial_ord,  // !(x >= 0.0) is intentional for NaN rejection
    clippy::too_many_lines,             // SAT generators naturally have many steps
    clippy::many_single_char_names,     // Axis math reads better with short names
    clippy::missing_errors_doc,         // Error docs added where non-obvious
)]

pub mod bvh;
pub mod mesh;
pub mod narrow;
pub mod obb_collider;
pub mod quadtree;
pub mod ray_collider;
pub mod tree_collider;

pub use bvh::{AabbTree, NoLeafNode, NoLeafTree, NodeRef};
pub use mesh::{Tri, TriMesh, VertexSource};
pub use narrow::{
    collide_trimesh_box, collide_trimesh_capsule, collide_trimesh_pair, tri_tri_overlap,
};
pub use obb_collider::{ObbCache, ObbCollider};
pub use quadtree::{GeomId, QuadTree};
pub use ray_collider::{collide_trimesh_ray, RayCollider, RayHit};
pub use tree_collider::{PairCache, TreeCollider};

// Re-export the shared types so downstream users need only one import.
pub use collide_types::{
    Aabb, CollideError, ContactAccumulator, ContactGeom, Obb, QueryFlags, TriFlags,
};
