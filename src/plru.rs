//! Tree-based pseudo-LRU replacement metadata for one cache set.
//!
//! The tree is a complete binary tree over the ways: bit index 0 is the
//! root, node `n`'s left child is `2n+1` and right child `2n+2`, and leaves
//! (in in-order traversal) correspond to ways. A routing bit of 0 means "go
//! left", 1 means "go right". The bits belong to the set as a whole, not to
//! any individual line, so they live in their own packed bit vector rather
//! than as a field on each line.

use bit_vec::BitVec;

/// `associativity - 1` routing bits for one cache set.
#[derive(Clone, Debug)]
pub struct PlruTree {
    bits: BitVec,
    associativity: usize,
}

impl PlruTree {
    /// A fresh tree for `associativity` ways, all bits zeroed.
    pub fn new(associativity: usize) -> Self {
        let num_bits = associativity.saturating_sub(1);
        PlruTree {
            bits: BitVec::from_elem(num_bits, false),
            associativity,
        }
    }

    /// Reset every routing bit to 0.
    pub fn reset(&mut self) {
        for i in 0..self.bits.len() {
            self.bits.set(i, false);
        }
    }

    /// Number of routing bits, `associativity - 1`.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Walk the tree from the root following the current routing bits,
    /// returning the leaf (way index) reached.
    pub fn find_victim(&self) -> usize {
        if self.associativity == 1 {
            return 0;
        }
        let mut node = 0usize;
        // A complete binary tree over `associativity` leaves has
        // `associativity - 1` internal nodes; walk until `node` would index
        // past them, i.e. until it names a leaf.
        loop {
            if node >= self.bits.len() {
                return node - self.bits.len();
            }
            node = if self.bits[node] {
                2 * node + 2
            } else {
                2 * node + 1
            };
        }
    }

    /// Update routing bits along the path to `way` so that future victim
    /// searches steer away from it: each bit on the path is set to point
    /// toward the *other* subtree from the one `way` is in.
    pub fn touch(&mut self, way: usize) {
        if self.associativity == 1 {
            return;
        }
        let path = self.path_to_leaf(way);
        for (node, went_right) in path {
            self.bits.set(node, !went_right);
        }
    }

    /// The sequence of `(internal_node_index, did_we_go_right)` along the
    /// root-to-leaf path for `way`, leaf index being in-order position
    /// among the `associativity` leaves.
    fn path_to_leaf(&self, way: usize) -> Vec<(usize, bool)> {
        let depth = self.associativity.trailing_zeros() as usize;
        let mut path = Vec::with_capacity(depth);
        let mut node = 0usize;
        let mut lo = 0usize;
        let mut hi = self.associativity;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let went_right = way >= mid;
            path.push((node, went_right));
            if went_right {
                node = 2 * node + 2;
                lo = mid;
            } else {
                node = 2 * node + 1;
                hi = mid;
            }
        }
        path
    }

    /// Routing bits, MSB-first root-to-leaf-ish ordering, for display in
    /// dumps: bit 0 (the root) printed first.
    pub fn bits_msb_first(&self) -> Vec<bool> {
        self.bits.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tree_routes_to_way_zero() {
        let t = PlruTree::new(8);
        assert_eq!(t.find_victim(), 0);
    }

    #[test]
    fn touching_a_way_steers_victim_elsewhere() {
        let mut t = PlruTree::new(4);
        // Touch way 0 repeatedly; the victim must never be way 0 again
        // until every other way has been touched too.
        t.touch(0);
        let victim = t.find_victim();
        assert_ne!(victim, 0);
    }

    #[test]
    fn filling_all_ways_cycles_plru_sanely() {
        let mut t = PlruTree::new(4);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let v = t.find_victim();
            seen.insert(v);
            t.touch(v);
        }
        assert_eq!(seen.len(), 4, "each way should be chosen exactly once when filling from a fresh tree");
    }

    #[test]
    fn arity_matches_associativity_minus_one() {
        for assoc in [1usize, 2, 4, 8, 16, 32] {
            let t = PlruTree::new(assoc);
            assert_eq!(t.len(), assoc.saturating_sub(1));
        }
    }

    #[test]
    fn reset_clears_all_bits() {
        let mut t = PlruTree::new(8);
        t.touch(5);
        t.reset();
        assert!(t.bits_msb_first().iter().all(|b| !b));
    }

    #[test]
    fn single_way_always_victim_zero() {
        let t = PlruTree::new(1);
        assert_eq!(t.find_victim(), 0);
        assert_eq!(t.len(), 0);
    }
}
