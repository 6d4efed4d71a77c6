//! Compact no-leaf BVH.
//!
//! Leaves of the generic tree are inlined into their parents: each of the
//! T-1 surviving nodes carries two [`NodeRef`]s that name either another
//! node in the same array or a triangle. The discriminator lives in the
//! type, not in pointer bits; the array stays a contiguous `u32`-indexed
//! sequence owned by the tree.
//!
//! Node order is the DFS construction order: every referenced node has a
//! strictly larger index than its parent. Correctness does not depend on
//! this, but the bottom-up [`NoLeafTree::refit`] exploits it - walking the
//! array from the last index to the first visits children before parents.

use collide_types::{Aabb, CollideError};

use crate::bvh::AabbTree;
use crate::mesh::VertexSource;

/// Tagged child reference: another node of the same array, or a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    /// Index of another internal node.
    Node(u32),
    /// Triangle (primitive) index.
    Prim(u32),
}

/// One internal node: bounds plus two tagged children.
#[derive(Debug, Clone)]
pub struct NoLeafNode {
    /// Center/extents bounds over the node's subtree.
    pub aabb: Aabb,
    /// Positive child.
    pub pos: NodeRef,
    /// Negative child.
    pub neg: NodeRef,
}

/// No-leaf BVH: exactly T-1 nodes for T triangles.
///
/// A single-triangle mesh has no internal nodes at all; its root reference
/// names the triangle directly.
#[derive(Debug, Clone)]
pub struct NoLeafTree {
    nodes: Vec<NoLeafNode>,
    root: NodeRef,
    primitive_count: usize,
}

impl NoLeafTree {
    /// Flatten a generic tree into the no-leaf form.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::IncompleteTree`] when the input does not
    /// have 2T-1 nodes with one primitive per leaf.
    pub fn build(tree: &AabbTree) -> Result<Self, CollideError> {
        let primitives = tree.primitive_count();
        if primitives == 0 {
            return Err(CollideError::EmptyMesh);
        }
        if tree.node_count() != 2 * primitives - 1 {
            return Err(CollideError::IncompleteTree {
                nodes: tree.node_count(),
                primitives,
            });
        }

        if primitives == 1 {
            let prim = tree
                .node(0)
                .primitive
                .ok_or(CollideError::IncompleteTree {
                    nodes: tree.node_count(),
                    primitives,
                })?;
            return Ok(Self {
                nodes: Vec::new(),
                root: NodeRef::Prim(prim),
                primitive_count: 1,
            });
        }

        let mut nodes = vec![
            NoLeafNode {
                aabb: Aabb::default(),
                pos: NodeRef::Prim(0),
                neg: NodeRef::Prim(0),
            };
            primitives - 1
        ];
        let mut current_id = 1u32;
        Self::flatten(tree, 0, 0, &mut current_id, &mut nodes)?;
        debug_assert_eq!(current_id as usize, nodes.len());

        Ok(Self {
            nodes,
            root: NodeRef::Node(0),
            primitive_count: primitives,
        })
    }

    /// Flatten the subtree rooted at `src` into destination slot `box_id`,
    /// allocating fresh slots from `current_id` for internal children.
    fn flatten(
        tree: &AabbTree,
        src: u32,
        box_id: u32,
        current_id: &mut u32,
        nodes: &mut [NoLeafNode],
    ) -> Result<(), CollideError> {
        let src_node = tree.node(src);
        let (pos_child, neg_child) = src_node.children.ok_or(CollideError::IncompleteTree {
            nodes: tree.node_count(),
            primitives: tree.primitive_count(),
        })?;

        nodes[box_id as usize].aabb = src_node.aabb;

        for (side, child) in [(0, pos_child), (1, neg_child)] {
            let child_node = tree.node(child);
            let child_ref = if let Some(prim) = child_node.primitive {
                NodeRef::Prim(prim)
            } else {
                let id = *current_id;
                *current_id += 1;
                Self::flatten(tree, child, id, current_id, nodes)?;
                NodeRef::Node(id)
            };
            if side == 0 {
                nodes[box_id as usize].pos = child_ref;
            } else {
                nodes[box_id as usize].neg = child_ref;
            }
        }
        Ok(())
    }

    /// Refit the tree after vertices moved, bottom-up.
    ///
    /// Primitive children re-take the component-wise min/max of their three
    /// vertices; node children read the box already refit this pass (the
    /// DFS order guarantees children sit at larger indices). Topology is
    /// not touched.
    pub fn refit(&mut self, source: &impl VertexSource) {
        let mut index = self.nodes.len();
        while index > 0 {
            index -= 1;
            let (pos, neg) = (self.nodes[index].pos, self.nodes[index].neg);
            let pos_box = self.child_bounds(pos, source);
            let neg_box = self.child_bounds(neg, source);
            self.nodes[index].aabb = pos_box.merged(&neg_box);
        }
    }

    fn child_bounds(&self, child: NodeRef, source: &impl VertexSource) -> Aabb {
        match child {
            NodeRef::Prim(p) => {
                let [v0, v1, v2] = source.triangle(p);
                Aabb::from_triangle(&v0, &v1, &v2)
            }
            NodeRef::Node(n) => self.nodes[n as usize].aabb,
        }
    }

    /// The root reference: `Node(0)` unless the mesh has one triangle.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        self.root
    }

    /// The node array in construction order.
    #[must_use]
    pub fn nodes(&self) -> &[NoLeafNode] {
        &self.nodes
    }

    /// Node by index.
    #[must_use]
    pub fn node(&self, index: u32) -> &NoLeafNode {
        &self.nodes[index as usize]
    }

    /// Internal node count (T-1).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Triangle count the tree was built over.
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    /// Bounds of the whole tree (root box, or the single triangle's bounds
    /// via the source for one-triangle meshes).
    #[must_use]
    pub fn root_bounds(&self, source: &impl VertexSource) -> Aabb {
        match self.root {
            NodeRef::Node(n) => self.nodes[n as usize].aabb,
            NodeRef::Prim(p) => {
                let [v0, v1, v2] = source.triangle(p);
                Aabb::from_triangle(&v0, &v1, &v2)
            }
        }
    }

    /// Depth-first walk. The visitor returns `false` to prune the subtree
    /// below a node.
    pub fn walk(&self, visitor: &mut impl FnMut(&NoLeafNode) -> bool) {
        if let NodeRef::Node(root) = self.root {
            self.walk_from(root, visitor);
        }
    }

    fn walk_from(&self, index: u32, visitor: &mut impl FnMut(&NoLeafNode) -> bool) {
        let node = &self.nodes[index as usize];
        if !visitor(node) {
            return;
        }
        if let NodeRef::Node(n) = node.pos {
            self.walk_from(n, visitor);
        }
        if let NodeRef::Node(n) = node.neg {
            self.walk_from(n, visitor);
        }
    }

    /// Every primitive index reachable from the root, in DFS order.
    #[must_use]
    pub fn collect_primitives(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.primitive_count);
        match self.root {
            NodeRef::Prim(p) => out.push(p),
            NodeRef::Node(root) => self.collect_from(root, &mut out),
        }
        out
    }

    fn collect_from(&self, index: u32, out: &mut Vec<u32>) {
        let node = &self.nodes[index as usize];
        for child in [node.pos, node.neg] {
            match child {
                NodeRef::Prim(p) => out.push(p),
                NodeRef::Node(n) => self.collect_from(n, out),
            }
        }
    }
}
