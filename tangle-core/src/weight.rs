//! Cumulative weight
//!
//! The weight of a transaction is 1 (itself) plus the number of distinct
//! transactions that approve it directly or transitively. A fresh tip weighs
//! 1; a transaction buried under many approvers weighs a lot.
//!
//! Weights are memoized. A successful insert bumps every cached ancestor by
//! exactly one; anything not cached is counted on demand with an explicit
//! stack, so arbitrarily deep ledgers never touch the call stack.

use crate::{store::LedgerStore, types::TxHash};
use std::collections::{HashMap, HashSet};

/// Memoized cumulative weights
#[derive(Debug, Clone, Default)]
pub struct WeightPropagator {
    cache: HashMap<TxHash, u64>,
}

impl WeightPropagator {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of `hash`, computing and caching it if needed.
    ///
    /// `None` when the hash is not in the store.
    pub fn weight_of(&mut self, store: &LedgerStore, hash: &TxHash) -> Option<u64> {
        if let Some(weight) = self.cache.get(hash) {
            return Some(*weight);
        }
        if !store.contains(hash) {
            return None;
        }

        let weight = count_with_descendants(store, hash);
        self.cache.insert(*hash, weight);
        Some(weight)
    }

    /// Cached weight, without computing anything
    pub fn cached(&self, hash: &TxHash) -> Option<u64> {
        self.cache.get(hash).copied()
    }

    /// Account for a transaction that was just attached.
    ///
    /// The new node weighs 1 and every distinct ancestor gains exactly one
    /// approver. Entries for unrelated nodes are left alone.
    pub fn on_attach(&mut self, store: &LedgerStore, hash: &TxHash) {
        self.cache.insert(*hash, 1);

        let mut visited: HashSet<TxHash> = HashSet::new();
        let mut stack: Vec<TxHash> = match store.get(hash) {
            Ok(tx) => tx.parents().to_vec(),
            Err(_) => return,
        };

        while let Some(ancestor) = stack.pop() {
            if !visited.insert(ancestor) {
                continue;
            }
            if let Some(weight) = self.cache.get_mut(&ancestor) {
                *weight += 1;
            }
            if let Ok(tx) = store.get(&ancestor) {
                stack.extend(tx.parents().iter().copied());
            }
        }

        tracing::trace!(%hash, ancestors = visited.len(), "Propagated weight");
    }

    /// Drop every cached weight (after a bulk structural change)
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached entries
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// 1 + number of distinct descendants of `hash`
fn count_with_descendants(store: &LedgerStore, hash: &TxHash) -> u64 {
    let mut visited: HashSet<TxHash> = HashSet::new();
    let mut stack = vec![*hash];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        stack.extend(store.children_of(&node).iter().copied());
    }

    visited.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::make_tx;

    #[test]
    fn test_tip_weighs_one() {
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let a = make_tx(1, vec![]);
        store.insert(a.clone()).unwrap();
        weights.on_attach(&store, &a.hash());

        assert_eq!(weights.weight_of(&store, &a.hash()), Some(1));
    }

    #[test]
    fn test_chain_weights() {
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);
        let c = make_tx(3, vec![b.hash()]);
        for tx in [&a, &b, &c] {
            store.insert(tx.clone()).unwrap();
            weights.on_attach(&store, &tx.hash());
        }

        assert_eq!(weights.weight_of(&store, &a.hash()), Some(3));
        assert_eq!(weights.weight_of(&store, &b.hash()), Some(2));
        assert_eq!(weights.weight_of(&store, &c.hash()), Some(1));
    }

    #[test]
    fn test_diamond_counts_distinct_approvers() {
        //      a
        //     / \
        //    b   c
        //     \ /
        //      d
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);
        let c = make_tx(3, vec![a.hash()]);
        let d = make_tx(4, vec![b.hash(), c.hash()]);
        for tx in [&a, &b, &c, &d] {
            store.insert(tx.clone()).unwrap();
            weights.on_attach(&store, &tx.hash());
        }

        assert_eq!(weights.weight_of(&store, &a.hash()), Some(4));
        assert_eq!(weights.weight_of(&store, &b.hash()), Some(2));
        assert_eq!(weights.weight_of(&store, &c.hash()), Some(2));

        // Incremental result matches a cold recount
        let mut cold = WeightPropagator::new();
        assert_eq!(cold.weight_of(&store, &a.hash()), Some(4));
    }

    #[test]
    fn test_unrelated_weights_unchanged() {
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![]);
        for tx in [&a, &b] {
            store.insert(tx.clone()).unwrap();
            weights.on_attach(&store, &tx.hash());
        }

        let c = make_tx(3, vec![a.hash()]);
        store.insert(c.clone()).unwrap();
        weights.on_attach(&store, &c.hash());

        assert_eq!(weights.cached(&a.hash()), Some(2));
        assert_eq!(weights.cached(&b.hash()), Some(1));
    }

    #[test]
    fn test_unknown_hash_has_no_weight() {
        let store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        assert_eq!(weights.weight_of(&store, &TxHash::from_bytes([3u8; 32])), None);
    }

    #[test]
    fn test_invalidate_then_lazy_recompute() {
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);
        for tx in [&a, &b] {
            store.insert(tx.clone()).unwrap();
            weights.on_attach(&store, &tx.hash());
        }

        weights.invalidate_all();
        assert_eq!(weights.cached_len(), 0);
        assert_eq!(weights.weight_of(&store, &a.hash()), Some(2));
        assert_eq!(weights.cached_len(), 1);
    }
}
