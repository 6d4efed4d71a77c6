//! Loose quadtree broad phase for 2.5-D scenes.
//!
//! A fixed-depth complete 4-ary tree over the X/Z plane, allocated as a
//! single block array (`(4^(depth+1) - 1) / 3` blocks). Parent and child
//! relations are indices into that array; geoms live in their own arena
//! and thread through per-block intrusive doubly linked lists. A block
//! hosts exactly the geoms whose AABB fits entirely inside its rectangle
//! but inside no child - larger or straddling geoms ride higher up, the
//! "loose" part of the scheme.
//!
//! Movement is handled lazily: [`QuadTree::update_aabb`] only marks the
//! geom dirty, and [`QuadTree::clean_geoms`] re-homes every dirty geom
//! before the next collision pass.
//!
//! A lock count guards the traversals. Mutating the tree from inside a
//! collision callback is a contract violation; it is diagnosed with a
//! warning rather than enforced, matching the original behavior.

use nalgebra::{Point3, Vector3};

use collide_types::{Aabb, CollideError};

/// Largest supported depth: the block array grows as `4^depth` and index
/// arithmetic stays in `u32`.
const MAX_DEPTH: u32 = 12;

/// Handle to a geom resident in a [`QuadTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeomId(u32);

impl GeomId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One square of the subdivision.
#[derive(Debug, Clone)]
struct Block {
    min_x: f64,
    max_x: f64,
    min_z: f64,
    max_z: f64,
    /// Head of the local intrusive geom list.
    first: Option<u32>,
    /// Number of geoms in this block's entire subtree.
    geom_count: usize,
    parent: Option<u32>,
    /// Index of the first of four consecutive children.
    children: Option<u32>,
}

impl Block {
    fn inside(&self, aabb: &Aabb) -> bool {
        let min = aabb.min();
        let max = aabb.max();
        min.x > self.min_x && max.x < self.max_x && min.z > self.min_z && max.z < self.max_z
    }

    /// X/Z rectangle rejection against a probe AABB.
    fn separated_from(&self, aabb: &Aabb) -> bool {
        let min = aabb.min();
        let max = aabb.max();
        min.x > self.max_x || max.x < self.min_x || min.z > self.max_z || max.z < self.min_z
    }
}

#[derive(Debug, Clone)]
struct GeomEntry {
    aabb: Aabb,
    block: u32,
    next: Option<u32>,
    prev: Option<u32>,
    enabled: bool,
    live: bool,
}

/// Quadtree broad-phase space.
pub struct QuadTree {
    blocks: Vec<Block>,
    geoms: Vec<GeomEntry>,
    free: Vec<u32>,
    dirty: Vec<u32>,
    lock_count: u32,
}

/// Smallest float strictly greater than `x` (positive finite input).
fn next_after_up(x: f64) -> f64 {
    debug_assert!(x.is_finite());
    if x == 0.0 {
        f64::MIN_POSITIVE
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() + 1)
    } else {
        f64::from_bits(x.to_bits() - 1)
    }
}

/// Blocks of a complete 4-ary tree of the given depth.
fn block_count_for_depth(depth: u32) -> usize {
    (((1u64 << (2 * (depth + 1))) - 1) / 3) as usize
}

impl QuadTree {
    /// Create a quadtree space covering `center +/- extents` in X and Z.
    ///
    /// The upper bounds are nudged one ULP outward so geoms sitting exactly
    /// on the boundary still classify inside.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::DepthTooLarge`] past the supported depth.
    pub fn new(center: Point3<f64>, extents: Vector3<f64>, depth: u32) -> Result<Self, CollideError> {
        if depth > MAX_DEPTH {
            return Err(CollideError::DepthTooLarge {
                depth,
                max: MAX_DEPTH,
            });
        }

        let count = block_count_for_depth(depth);
        let mut blocks = vec![
            Block {
                min_x: 0.0,
                max_x: 0.0,
                min_z: 0.0,
                max_z: 0.0,
                first: None,
                geom_count: 0,
                parent: None,
                children: None,
            };
            count
        ];

        let min_x = center.x - extents.x;
        let max_x = next_after_up(center.x + extents.x);
        let min_z = center.z - extents.z;
        let max_z = next_after_up(center.z + extents.z);

        let mut cursor = 1u32;
        Self::create_block(&mut blocks, 0, min_x, max_x, min_z, max_z, None, depth, &mut cursor);
        debug_assert_eq!(cursor as usize, count);

        Ok(Self {
            blocks,
            geoms: Vec::new(),
            free: Vec::new(),
            dirty: Vec::new(),
            lock_count: 0,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_block(
        blocks: &mut [Block],
        index: u32,
        min_x: f64,
        max_x: f64,
        min_z: f64,
        max_z: f64,
        parent: Option<u32>,
        depth: u32,
        cursor: &mut u32,
    ) {
        debug_assert!(min_x <= max_x && min_z <= max_z);
        let block = &mut blocks[index as usize];
        block.min_x = min_x;
        block.max_x = max_x;
        block.min_z = min_z;
        block.max_z = max_z;
        block.parent = parent;
        block.first = None;
        block.geom_count = 0;

        if depth > 0 {
            let children = *cursor;
            *cursor += 4;
            blocks[index as usize].children = Some(children);

            let mid_x = min_x + (max_x - min_x) * 0.5;
            let mid_z = min_z + (max_z - min_z) * 0.5;
            let bounds = [
                (min_x, mid_x, min_z, mid_z),
                (min_x, mid_x, mid_z, max_z),
                (mid_x, max_x, min_z, mid_z),
                (mid_x, max_x, mid_z, max_z),
            ];
            for (i, (x0, x1, z0, z1)) in bounds.into_iter().enumerate() {
                Self::create_block(
                    blocks,
                    children + i as u32,
                    x0,
                    x1,
                    z0,
                    z1,
                    Some(index),
                    depth - 1,
                    cursor,
                );
            }
        } else {
            blocks[index as usize].children = None;
        }
    }

    /// Number of blocks in the space.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of geoms in the whole space (the root block's subtree count).
    #[must_use]
    pub fn geom_count(&self) -> usize {
        self.blocks[0].geom_count
    }

    /// Insert a geom with the given bounds. Returns its handle.
    pub fn add(&mut self, aabb: Aabb) -> GeomId {
        if self.lock_count > 0 {
            tracing::warn!("quadtree add() while space is locked");
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.geoms.push(GeomEntry {
                    aabb,
                    block: 0,
                    next: None,
                    prev: None,
                    enabled: true,
                    live: false,
                });
                (self.geoms.len() - 1) as u32
            }
        };

        let id = GeomId(slot);
        let block = self.find_block_from(0, &aabb);
        self.geoms[id.index()] = GeomEntry {
            aabb,
            block,
            next: None,
            prev: None,
            enabled: true,
            live: true,
        };
        self.link(id, block);
        self.dirty.push(slot);
        id
    }

    /// Remove a geom from the space.
    pub fn remove(&mut self, id: GeomId) {
        if self.lock_count > 0 {
            tracing::warn!("quadtree remove() while space is locked");
        }
        debug_assert!(self.geoms[id.index()].live, "geom already removed");

        let block = self.geoms[id.index()].block;
        self.unlink(id, block);
        self.geoms[id.index()].live = false;
        // A moved geom can sit in the dirty list more than once; drop every
        // occurrence.
        self.dirty.retain(|&g| g != id.0);
        self.free.push(id.0);
    }

    /// Replace a geom's bounds and mark it for re-homing.
    pub fn update_aabb(&mut self, id: GeomId, aabb: Aabb) {
        debug_assert!(self.geoms[id.index()].live);
        self.geoms[id.index()].aabb = aabb;
        self.dirty.push(id.0);
    }

    /// Bounds of a resident geom.
    #[must_use]
    pub fn aabb(&self, id: GeomId) -> &Aabb {
        &self.geoms[id.index()].aabb
    }

    /// Enable or disable a geom; disabled geoms keep residency but are
    /// skipped by the collision passes.
    pub fn set_enabled(&mut self, id: GeomId, enabled: bool) {
        self.geoms[id.index()].enabled = enabled;
    }

    /// Re-home every dirty geom.
    pub fn clean_geoms(&mut self) {
        self.lock_count += 1;
        while let Some(slot) = self.dirty.pop() {
            let id = GeomId(slot);
            if self.geoms[id.index()].live {
                self.traverse(id);
            }
        }
        self.lock_count -= 1;
    }

    /// Move a geom to the deepest block fully containing its AABB, if that
    /// block changed.
    fn traverse(&mut self, id: GeomId) {
        let entry = &self.geoms[id.index()];
        let current = entry.block;
        let aabb = entry.aabb;
        let target = self.find_block(current, &aabb);
        if target != current {
            self.unlink(id, current);
            self.geoms[id.index()].block = target;
            self.link(id, target);
        }
    }

    /// Walk up until the AABB fits, then down into the deepest child that
    /// still fully contains it.
    fn find_block(&self, start: u32, aabb: &Aabb) -> u32 {
        let mut index = start;
        loop {
            if self.blocks[index as usize].inside(aabb) {
                return self.find_block_from(index, aabb);
            }
            match self.blocks[index as usize].parent {
                Some(parent) => index = parent,
                None => return index, // outside the world: hosted at the root
            }
        }
    }

    /// Descend from a containing block into the deepest containing child.
    fn find_block_from(&self, start: u32, aabb: &Aabb) -> u32 {
        let mut index = start;
        'descend: loop {
            if let Some(children) = self.blocks[index as usize].children {
                for i in 0..4 {
                    let child = children + i;
                    if self.blocks[child as usize].inside(aabb) {
                        index = child;
                        continue 'descend;
                    }
                }
            }
            return index;
        }
    }

    fn link(&mut self, id: GeomId, block: u32) {
        let head = self.blocks[block as usize].first;
        self.geoms[id.index()].next = head;
        self.geoms[id.index()].prev = None;
        self.geoms[id.index()].block = block;
        if let Some(head) = head {
            self.geoms[head as usize].prev = Some(id.0);
        }
        self.blocks[block as usize].first = Some(id.0);

        let mut b = Some(block);
        while let Some(index) = b {
            self.blocks[index as usize].geom_count += 1;
            b = self.blocks[index as usize].parent;
        }
    }

    fn unlink(&mut self, id: GeomId, block: u32) {
        let (prev, next) = {
            let entry = &self.geoms[id.index()];
            (entry.prev, entry.next)
        };
        match prev {
            Some(prev) => self.geoms[prev as usize].next = next,
            None => self.blocks[block as usize].first = next,
        }
        if let Some(next) = next {
            self.geoms[next as usize].prev = prev;
        }
        self.geoms[id.index()].next = None;
        self.geoms[id.index()].prev = None;

        let mut b = Some(block);
        while let Some(index) = b {
            self.blocks[index as usize].geom_count -= 1;
            b = self.blocks[index as usize].parent;
        }
    }

    /// Check the count bookkeeping: every block's subtree count equals its
    /// local list length plus the children's counts.
    #[must_use]
    pub fn counts_consistent(&self) -> bool {
        for (index, block) in self.blocks.iter().enumerate() {
            let mut local = 0usize;
            let mut g = block.first;
            while let Some(slot) = g {
                local += 1;
                g = self.geoms[slot as usize].next;
            }
            let child_sum: usize = match block.children {
                Some(children) => (0..4)
                    .map(|i| self.blocks[(children + i) as usize].geom_count)
                    .sum(),
                None => 0,
            };
            if block.geom_count != local + child_sum {
                tracing::warn!(block = index, "quadtree count mismatch");
                return false;
            }
        }
        true
    }

    /// Pair every overlapping enabled geom pair in the space.
    ///
    /// Runs [`QuadTree::clean_geoms`] first. Blocks whose subtree holds at
    /// most one geom are skipped for self-collision; empty children are
    /// skipped for cross tests.
    pub fn collide(&mut self, callback: &mut dyn FnMut(GeomId, GeomId)) {
        self.lock_count += 1;
        self.clean_geoms();
        self.block_collide(0, callback);
        self.lock_count -= 1;
    }

    fn block_collide(&self, block: u32, callback: &mut dyn FnMut(GeomId, GeomId)) {
        // Local list against itself and everything below.
        let mut g = self.blocks[block as usize].first;
        while let Some(slot) = g {
            let id = GeomId(slot);
            let next = self.geoms[id.index()].next;
            if self.geoms[id.index()].enabled {
                self.collide_against(block, id, next, callback, false);
            }
            g = next;
        }

        if let Some(children) = self.blocks[block as usize].children {
            for i in 0..4 {
                let child = children + i;
                if self.blocks[child as usize].geom_count <= 1 {
                    continue;
                }
                self.block_collide(child, callback);
            }
        }
    }

    /// One geom against a chain starting at `start` in `block`, then
    /// against the block's descendants. `swap` flips the callback argument
    /// order (used by the external-probe path).
    fn collide_against(
        &self,
        block: u32,
        g1: GeomId,
        start: Option<u32>,
        callback: &mut dyn FnMut(GeomId, GeomId),
        swap: bool,
    ) {
        let aabb1 = self.geoms[g1.index()].aabb;

        let mut g = start;
        while let Some(slot) = g {
            let g2 = GeomId(slot);
            let entry = &self.geoms[g2.index()];
            if g2 != g1 && entry.enabled && aabb1.overlaps(&entry.aabb) {
                if swap {
                    callback(g2, g1);
                } else {
                    callback(g1, g2);
                }
            }
            g = entry.next;
        }

        if let Some(children) = self.blocks[block as usize].children {
            for i in 0..4 {
                let child = children + i;
                let count = self.blocks[child as usize].geom_count;
                if count == 0 {
                    continue;
                }
                // Rectangle rejection only pays off past a single geom.
                if count > 1 && self.blocks[child as usize].separated_from(&aabb1) {
                    continue;
                }
                let first = self.blocks[child as usize].first;
                self.collide_against(child, g1, first, callback, swap);
            }
        }
    }

    /// Local list of a block against a probe geom, callback as
    /// `(local, probe)`.
    fn collide_local(&self, block: u32, probe: GeomId, callback: &mut dyn FnMut(GeomId, GeomId)) {
        let probe_aabb = self.geoms[probe.index()].aabb;
        let mut g = self.blocks[block as usize].first;
        while let Some(slot) = g {
            let id = GeomId(slot);
            let entry = &self.geoms[id.index()];
            if entry.enabled && probe_aabb.overlaps(&entry.aabb) {
                callback(id, probe);
            }
            g = entry.next;
        }
    }

    /// Pair one resident geom against the rest of the space.
    ///
    /// The callback receives `(other, probe)`: the hosting block's subtree
    /// is searched first, then every ancestor's local list.
    pub fn collide2(&mut self, probe: GeomId, callback: &mut dyn FnMut(GeomId, GeomId)) {
        self.lock_count += 1;
        self.clean_geoms();

        let block = self.geoms[probe.index()].block;
        let first = self.blocks[block as usize].first;
        // The probe sits somewhere in its own block's chain; the identity
        // guard in the chain walk keeps it from pairing with itself.
        self.collide_against(block, probe, first, callback, true);

        let mut ancestor = self.blocks[block as usize].parent;
        while let Some(index) = ancestor {
            self.collide_local(index, probe, callback);
            ancestor = self.blocks[index as usize].parent;
        }

        self.lock_count -= 1;
    }

    /// Pair an external AABB (not resident in this space) against every
    /// enabled geom, starting at the root.
    pub fn collide_external(&mut self, aabb: &Aabb, callback: &mut dyn FnMut(GeomId)) {
        self.lock_count += 1;
        self.clean_geoms();
        self.collide_external_block(0, aabb, callback);
        self.lock_count -= 1;
    }

    fn collide_external_block(&self, block: u32, aabb: &Aabb, callback: &mut dyn FnMut(GeomId)) {
        let mut g = self.blocks[block as usize].first;
        while let Some(slot) = g {
            let id = GeomId(slot);
            let entry = &self.geoms[id.index()];
            if entry.enabled && aabb.overlaps(&entry.aabb) {
                callback(id);
            }
            g = entry.next;
        }
        if let Some(children) = self.blocks[block as usize].children {
            for i in 0..4 {
                let child = children + i;
                let count = self.blocks[child as usize].geom_count;
                if count == 0 {
                    continue;
                }
                if count > 1 && self.blocks[child as usize].separated_from(aabb) {
                    continue;
                }
                self.collide_external_block(child, aabb, callback);
            }
        }
    }

    /// Hosting block of a geom (diagnostic).
    #[must_use]
    pub fn resident_block(&self, id: GeomId) -> u32 {
        self.geoms[id.index()].block
    }
}

impl std::fmt::Debug for QuadTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadTree")
            .field("blocks", &self.blocks.len())
            .field("geoms", &self.geom_count())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn small_aabb(x: f64, z: f64) -> Aabb {
        Aabb::new(Point3::new(x, 0.0, z), Vector3::new(0.1, 0.1, 0.1))
    }

    fn world() -> QuadTree {
        QuadTree::new(Point3::origin(), Vector3::new(10.0, 10.0, 10.0), 3).unwrap()
    }

    #[test]
    fn test_block_count_formula() {
        // (4^(d+1) - 1) / 3
        assert_eq!(QuadTree::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), 0)
            .unwrap()
            .block_count(), 1);
        assert_eq!(world().block_count(), 85);
    }

    #[test]
    fn test_depth_clamp() {
        let err = QuadTree::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), 40).unwrap_err();
        assert!(matches!(err, CollideError::DepthTooLarge { .. }));
    }

    #[test]
    fn test_add_remove_counts() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        let b = tree.add(small_aabb(5.0, 5.0));
        assert_eq!(tree.geom_count(), 2);
        assert!(tree.counts_consistent());

        tree.remove(a);
        assert_eq!(tree.geom_count(), 1);
        assert!(tree.counts_consistent());

        tree.remove(b);
        assert_eq!(tree.geom_count(), 0);
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_small_geom_lands_in_leaf() {
        let mut tree = world();
        let id = tree.add(small_aabb(-7.0, -7.0));
        tree.clean_geoms();
        let block = tree.resident_block(id);
        assert!(tree.blocks[block as usize].children.is_none(), "expected a leaf");
    }

    #[test]
    fn test_straddling_geom_hoisted() {
        let mut tree = world();
        // Straddles the root split at x = 0: no child contains it.
        let id = tree.add(Aabb::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0)));
        tree.clean_geoms();
        assert_eq!(tree.resident_block(id), 0);
    }

    #[test]
    fn test_outside_world_hosted_at_root() {
        let mut tree = world();
        let id = tree.add(small_aabb(50.0, 50.0));
        tree.clean_geoms();
        assert_eq!(tree.resident_block(id), 0);
        assert_eq!(tree.geom_count(), 1);
    }

    #[test]
    fn test_move_across_boundary_rehomes() {
        let mut tree = world();
        let id = tree.add(small_aabb(-5.0, -5.0));
        tree.clean_geoms();
        let before = tree.resident_block(id);

        tree.update_aabb(id, small_aabb(5.0, 5.0));
        tree.clean_geoms();
        let after = tree.resident_block(id);

        assert_ne!(before, after);
        assert_eq!(tree.geom_count(), 1);
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_collide_finds_overlapping_pair() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        let b = tree.add(small_aabb(-5.05, -5.05));
        let _far = tree.add(small_aabb(5.0, 5.0));

        let mut pairs = Vec::new();
        tree.collide(&mut |g1, g2| pairs.push((g1, g2)));
        assert_eq!(pairs.len(), 1);
        let (g1, g2) = pairs[0];
        assert!((g1 == a && g2 == b) || (g1 == b && g2 == a));
    }

    #[test]
    fn test_collide_cross_block_pair() {
        let mut tree = world();
        // One geom straddles the center and lives high; the other sits in
        // a leaf underneath it.
        let big = tree.add(Aabb::new(Point3::origin(), Vector3::new(2.0, 2.0, 2.0)));
        let small = tree.add(small_aabb(1.0, 1.0));

        let mut pairs = Vec::new();
        tree.collide(&mut |g1, g2| pairs.push((g1, g2)));
        assert_eq!(pairs.len(), 1);
        let (g1, g2) = pairs[0];
        assert!((g1 == big && g2 == small) || (g1 == small && g2 == big));
    }

    #[test]
    fn test_disabled_geom_skipped() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        let _b = tree.add(small_aabb(-5.05, -5.05));
        tree.set_enabled(a, false);

        let mut pairs = 0;
        tree.collide(&mut |_, _| pairs += 1);
        assert_eq!(pairs, 0);
    }

    #[test]
    fn test_collide2_orders_probe_second() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        let b = tree.add(small_aabb(-5.05, -5.05));

        let mut seen = Vec::new();
        tree.collide2(b, &mut |other, probe| seen.push((other, probe)));
        assert_eq!(seen, vec![(a, b)]);
    }

    #[test]
    fn test_collide_external() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        let _far = tree.add(small_aabb(5.0, 5.0));

        let mut seen = Vec::new();
        tree.collide_external(&small_aabb(-5.02, -5.02), &mut |id| seen.push(id));
        assert_eq!(seen, vec![a]);
    }

    #[test]
    fn test_hundred_geoms_residency() {
        // Depth 3, world +/-10, 100 small geoms on a grid.
        let mut tree = world();
        let mut ids = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let x = -9.0 + 2.0 * f64::from(i);
                let z = -9.0 + 2.0 * f64::from(j);
                ids.push(tree.add(small_aabb(x, z)));
            }
        }
        tree.clean_geoms();
        assert_eq!(tree.geom_count(), 100);
        assert!(tree.counts_consistent());

        // Sum of local list lengths across all blocks is the same 100.
        let mut total = 0usize;
        for block in 0..tree.block_count() {
            let mut g = tree.blocks[block].first;
            while let Some(slot) = g {
                total += 1;
                g = tree.geoms[slot as usize].next;
            }
        }
        assert_eq!(total, 100);

        // Move one geom across a block boundary.
        let moved = ids[0];
        let before = tree.resident_block(moved);
        tree.update_aabb(moved, small_aabb(9.0, 9.0));
        tree.clean_geoms();
        assert_eq!(tree.geom_count(), 100);
        assert_ne!(tree.resident_block(moved), before);
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_slot_reuse_keeps_handles_fresh() {
        let mut tree = world();
        let a = tree.add(small_aabb(-5.0, -5.0));
        tree.remove(a);
        let b = tree.add(small_aabb(5.0, 5.0));
        assert_eq!(tree.geom_count(), 1);
        tree.clean_geoms();
        assert!(tree.counts_consistent());
        assert!(tree.blocks[tree.resident_block(b) as usize].children.is_none());
    }
}
