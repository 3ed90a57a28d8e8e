//! Sum tree for prioritized sampling.
//!
//! The tree is stored in a flat vector of `2 * capacity - 1` nodes. Node `i` has children
//! `2i + 1` and `2i + 2` and parent `(i - 1) / 2`; the last `capacity` nodes are leaves.
//! Every internal node holds the sum of its two children, so the root is the total
//! priority mass.
//!
//! Indices returned by [`SumTree::add`] and [`SumTree::get`] are *tree indices*, i.e.,
//! positions in the flat node vector, and are what [`SumTree::update`] expects back.
use segment_tree::{
    ops::{MaxIgnoreNaN, MinIgnoreNaN},
    SegmentPoint,
};

/// Weighted sampler over a fixed number of leaves.
///
/// Each leaf carries a priority and the buffer slot it was written for. Leaves are
/// written in circular order by [`SumTree::add`], whose cursor the owning buffer keeps
/// in lockstep with its own write position.
#[derive(Debug)]
pub struct SumTree {
    capacity: usize,
    tree: Vec<f32>,
    slots: Vec<usize>,
    cursor: usize,
    n_entries: usize,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
}

impl SumTree {
    /// Creates a sum tree with `capacity` leaves, all holding zero priority.
    ///
    /// `capacity` must be positive; the replay buffer config checks this before
    /// constructing the tree.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            tree: vec![0f32; 2 * capacity - 1],
            slots: vec![0; capacity],
            cursor: 0,
            n_entries: 0,
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
        }
    }

    /// Restores the sums on the path from node `ix` up to the root.
    fn propagate(&mut self, mut ix: usize) {
        while ix > 0 {
            ix = (ix - 1) / 2;
            let left = 2 * ix + 1;
            self.tree[ix] = self.tree[left] + self.tree[left + 1];
        }
    }

    fn set(&mut self, ix: usize, p: f32) {
        let leaf = ix + 1 - self.capacity;
        self.tree[ix] = p;
        self.min_tree.modify(leaf, p);
        self.max_tree.modify(leaf, p);
        self.propagate(ix);
    }

    /// Returns `true` if `ix` is a leaf that has been written at least once.
    fn is_written_leaf(&self, ix: usize) -> bool {
        ix >= self.capacity - 1 && ix < self.tree.len() && ix + 1 - self.capacity < self.n_entries
    }

    /// Total priority mass, i.e., the value of the root.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Number of leaves.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of leaves written so far, saturating at the capacity.
    pub fn len(&self) -> usize {
        self.n_entries
    }

    /// Returns `true` if no priority has been added yet.
    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    /// Leaf position, in `0..capacity`, that the next [`SumTree::add`] writes.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// All nodes of the tree, root first and leaves last.
    pub fn nodes(&self) -> &[f32] {
        &self.tree
    }

    /// Priority stored at tree index `ix`, if it is a written leaf.
    pub fn priority(&self, ix: usize) -> Option<f32> {
        if self.is_written_leaf(ix) {
            Some(self.tree[ix])
        } else {
            None
        }
    }

    /// Buffer slot associated with tree index `ix`, if it is a written leaf.
    pub fn slot(&self, ix: usize) -> Option<usize> {
        if self.is_written_leaf(ix) {
            Some(self.slots[ix + 1 - self.capacity])
        } else {
            None
        }
    }

    /// Smallest priority currently stored in the leaves.
    ///
    /// Unlike the running bounds kept by the replay buffer, this reflects overwrites
    /// and lowered priorities.
    pub fn min_leaf(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.min_tree.query(0, self.n_entries))
        }
    }

    /// Largest priority currently stored in the leaves.
    pub fn max_leaf(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.max_tree.query(0, self.n_entries))
        }
    }

    /// Writes `p` into the next leaf in circular order and associates it with `slot`.
    ///
    /// Once every leaf has been written, the oldest leaf is overwritten in place.
    /// Returns the tree index of the written leaf.
    pub fn add(&mut self, p: f32, slot: usize) -> usize {
        let leaf = self.cursor;
        let ix = leaf + self.capacity - 1;
        self.slots[leaf] = slot;
        self.set(ix, p);

        self.cursor = (self.cursor + 1) % self.capacity;
        if self.n_entries < self.capacity {
            self.n_entries += 1;
        }
        ix
    }

    /// Overwrites the priority of the leaf at tree index `ix`.
    ///
    /// Does nothing and returns `false` if `ix` is not a leaf written by
    /// [`SumTree::add`].
    pub fn update(&mut self, ix: usize, p: f32) -> bool {
        if !self.is_written_leaf(ix) {
            return false;
        }
        self.set(ix, p);
        true
    }

    /// Finds the leaf whose cumulative priority interval contains `s`.
    ///
    /// Returns `(tree_index, priority, slot)`. `s` is expected in `[0, total)`. At each
    /// node the descent goes left iff `s` is strictly below the left sum, so boundary
    /// values go right. A right subtree without mass is never entered, which keeps
    /// values at or above the total on the last non-empty leaf.
    pub fn get(&self, s: f32) -> (usize, f32, usize) {
        debug_assert!(!self.is_empty());

        let mut ix = 0;
        let mut s = s.max(0.0);
        loop {
            let left = 2 * ix + 1;
            if left >= self.tree.len() {
                break;
            }
            let right = left + 1;
            if s < self.tree[left] || self.tree[right] <= 0.0 {
                ix = left;
            } else {
                s -= self.tree[left];
                ix = right;
            }
        }

        (ix, self.tree[ix], self.slots[ix + 1 - self.capacity])
    }
}
