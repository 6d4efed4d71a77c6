//! Generic AABB tree builder.
//!
//! Builds a full binary tree over triangle bounds: every leaf carries
//! exactly one primitive, so a tree over T triangles has exactly 2T-1
//! nodes. Splitting is longest-axis at the median of primitive centroids.
//!
//! The tree is transient: it exists to be flattened into a
//! [`NoLeafTree`](crate::bvh::NoLeafTree) and dropped.

use collide_types::{Aabb, CollideError};

use crate::mesh::VertexSource;

/// A node of the generic tree.
#[derive(Debug, Clone)]
pub struct AabbTreeNode {
    /// Bounds over the node's subtree.
    pub aabb: Aabb,
    /// Child node indices (positive, negative), `None` for leaves.
    pub children: Option<(u32, u32)>,
    /// The single primitive of a leaf, `None` for internal nodes.
    pub primitive: Option<u32>,
}

/// Generic full binary AABB tree, 2T-1 nodes for T primitives.
#[derive(Debug, Clone)]
pub struct AabbTree {
    nodes: Vec<AabbTreeNode>,
    primitive_count: usize,
}

impl AabbTree {
    /// Build the tree over all triangles of a vertex source.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::EmptyMesh`] when the source has no
    /// triangles.
    pub fn from_source(source: &impl VertexSource) -> Result<Self, CollideError> {
        let count = source.triangle_count();
        if count == 0 {
            return Err(CollideError::EmptyMesh);
        }

        let prims: Vec<(u32, Aabb)> = (0..count as u32)
            .map(|i| {
                let [v0, v1, v2] = source.triangle(i);
                (i, Aabb::from_triangle(&v0, &v1, &v2))
            })
            .collect();

        let mut indices: Vec<u32> = (0..count as u32).collect();
        let mut nodes = Vec::with_capacity(2 * count - 1);
        Self::build_recursive(&prims, &mut indices, &mut nodes);
        debug_assert_eq!(nodes.len(), 2 * count - 1);

        Ok(Self {
            nodes,
            primitive_count: count,
        })
    }

    /// Build recursively over `indices`, pushing nodes pre-order.
    ///
    /// Returns the index of the created node.
    fn build_recursive(
        prims: &[(u32, Aabb)],
        indices: &mut [u32],
        nodes: &mut Vec<AabbTreeNode>,
    ) -> u32 {
        let mut aabb = prims[indices[0] as usize].1;
        for &i in indices.iter().skip(1) {
            aabb = aabb.merged(&prims[i as usize].1);
        }

        let node_idx = nodes.len() as u32;
        if indices.len() == 1 {
            nodes.push(AabbTreeNode {
                aabb,
                children: None,
                primitive: Some(indices[0]),
            });
            return node_idx;
        }

        // Split at the median of centroids along the longest axis.
        let extent = aabb.extents;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };
        indices.sort_by(|&a, &b| {
            let ca = prims[a as usize].1.center[axis];
            let cb = prims[b as usize].1.center[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = indices.len() / 2;

        nodes.push(AabbTreeNode {
            aabb,
            children: None, // patched below
            primitive: None,
        });

        let (left, right) = indices.split_at_mut(mid);
        let pos = Self::build_recursive(prims, left, nodes);
        let neg = Self::build_recursive(prims, right, nodes);
        nodes[node_idx as usize].children = Some((pos, neg));

        node_idx
    }

    /// Raw construction for tests that need malformed trees.
    #[cfg(test)]
    pub(crate) fn from_raw(nodes: Vec<AabbTreeNode>, primitive_count: usize) -> Self {
        Self {
            nodes,
            primitive_count,
        }
    }

    /// Node by index; the root is index 0.
    #[must_use]
    pub fn node(&self, index: u32) -> &AabbTreeNode {
        &self.nodes[index as usize]
    }

    /// Total node count.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Primitive count the tree was built over.
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }
}
