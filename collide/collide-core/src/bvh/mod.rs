//! Bounding-volume hierarchy: generic builder tree and the compact
//! no-leaf tree the queries run against.
//!
//! Construction is a two-step pipeline, as in the original design:
//!
//! 1. [`AabbTree`] - a transient full binary tree (2T-1 nodes, one
//!    primitive per leaf) built top-down by longest-axis median split.
//! 2. [`NoLeafTree`] - the persistent form: leaves are inlined into their
//!    parents, leaving exactly T-1 nodes whose two child references each
//!    either name another node or a triangle.
//!
//! The no-leaf tree is the one that gets refit when the mesh deforms;
//! with half the nodes of the standard tree, a bottom-up refit touches
//! half the boxes.

mod builder;
mod noleaf;

pub use builder::{AabbTree, AabbTreeNode};
pub use noleaf::{NoLeafNode, NoLeafTree, NodeRef};
