//! Ledger store
//!
//! Owns every transaction record plus the forward adjacency relation
//! (parent → children). Records are stored by value and keyed by hash;
//! relationships are hash values, never owning pointers.
//!
//! # Invariants
//!
//! - Every parent hash of every record is itself a key of the store
//! - `children[p]` lists `t` exactly when `p` is one of `t.parents`
//! - `tips` is exactly the set of hashes with no children

use crate::{
    error::{Error, Result},
    types::{Transaction, TxHash},
};
use std::collections::{HashMap, HashSet};

/// In-memory arena of transactions and their approval edges
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    /// All records indexed by hash
    transactions: HashMap<TxHash, Transaction>,

    /// Children of each record, in attachment order
    children: HashMap<TxHash, Vec<TxHash>>,

    /// Records nobody approves yet
    tips: HashSet<TxHash>,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record together with its parent edges.
    ///
    /// Atomic: on error nothing was written.
    pub fn insert(&mut self, transaction: Transaction) -> Result<()> {
        let hash = transaction.hash();

        if self.transactions.contains_key(&hash) {
            return Err(Error::DuplicateTransaction(hash));
        }

        // Check every parent before touching any edge
        if let Some(parent) = transaction
            .parents()
            .iter()
            .find(|p| !self.transactions.contains_key(p))
        {
            return Err(Error::UnknownParent {
                child: hash,
                parent: *parent,
            });
        }

        for parent in transaction.parents() {
            self.children.entry(*parent).or_default().push(hash);
            self.tips.remove(parent);
        }
        self.tips.insert(hash);
        self.transactions.insert(hash, transaction);

        tracing::debug!(%hash, "Transaction committed to store");

        Ok(())
    }

    /// Insert a record without requiring its parents to be present yet.
    ///
    /// Used when rebuilding from a log whose lines can come in any order;
    /// [`LedgerStore::link`] wires the edges once the whole batch is staged.
    pub(crate) fn stage(&mut self, transaction: Transaction) -> Result<()> {
        let hash = transaction.hash();
        if self.transactions.contains_key(&hash) {
            return Err(Error::DuplicateTransaction(hash));
        }
        self.tips.insert(hash);
        self.transactions.insert(hash, transaction);
        Ok(())
    }

    /// Add edges from every present parent of a staged record.
    ///
    /// Returns the first parent that is missing, if any.
    pub(crate) fn link(&mut self, hash: &TxHash) -> Option<TxHash> {
        let parents = match self.transactions.get(hash) {
            Some(tx) => tx.parents().to_vec(),
            None => return None,
        };

        let mut missing = None;
        for parent in parents {
            if self.transactions.contains_key(&parent) {
                self.children.entry(parent).or_default().push(*hash);
                self.tips.remove(&parent);
            } else if missing.is_none() {
                missing = Some(parent);
            }
        }
        missing
    }

    /// Remove a record and its parent edges (rollback only).
    ///
    /// Parents left without children become tips again.
    pub(crate) fn remove(&mut self, hash: &TxHash) -> Option<Transaction> {
        let transaction = self.transactions.remove(hash)?;

        for parent in transaction.parents() {
            if let Some(list) = self.children.get_mut(parent) {
                list.retain(|child| child != hash);
                if list.is_empty() {
                    self.children.remove(parent);
                    if self.transactions.contains_key(parent) {
                        self.tips.insert(*parent);
                    }
                }
            }
        }
        self.children.remove(hash);
        self.tips.remove(hash);

        Some(transaction)
    }

    /// Get a record by hash
    pub fn get(&self, hash: &TxHash) -> Result<&Transaction> {
        self.transactions
            .get(hash)
            .ok_or(Error::NotFound(*hash))
    }

    pub(crate) fn get_mut(&mut self, hash: &TxHash) -> Option<&mut Transaction> {
        self.transactions.get_mut(hash)
    }

    /// Whether a hash is stored
    pub fn contains(&self, hash: &TxHash) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Direct approvers of `hash`, in attachment order
    pub fn children_of(&self, hash: &TxHash) -> &[TxHash] {
        self.children.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hashes with no approvers
    pub fn all_tips(&self) -> &HashSet<TxHash> {
        &self.tips
    }

    /// Every stored record, in no particular order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    /// Every stored hash, in no particular order
    pub fn hashes(&self) -> impl Iterator<Item = &TxHash> {
        self.transactions.keys()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{AccountId, TxId};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    /// Build a record with a distinct id and the given parents
    pub(crate) fn make_tx(id: u64, parents: Vec<TxHash>) -> Transaction {
        Transaction::create(
            TxId::new(id),
            AccountId::new("alice"),
            AccountId::new("bob"),
            Decimal::new(100, 0),
            Decimal::ONE,
            Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            parents,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_genesis() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        store.insert(a.clone()).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.all_tips().contains(&a.hash()));
        assert!(store.children_of(&a.hash()).is_empty());
        assert_eq!(store.get(&a.hash()).unwrap().id(), TxId::new(1));
    }

    #[test]
    fn test_insert_child_updates_tips() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);
        store.insert(a.clone()).unwrap();
        store.insert(b.clone()).unwrap();

        assert_eq!(store.children_of(&a.hash()), &[b.hash()]);
        assert!(!store.all_tips().contains(&a.hash()));
        assert!(store.all_tips().contains(&b.hash()));
    }

    #[test]
    fn test_children_keep_attachment_order() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        store.insert(a.clone()).unwrap();

        let kids: Vec<Transaction> = (2..6).map(|i| make_tx(i, vec![a.hash()])).collect();
        for kid in &kids {
            store.insert(kid.clone()).unwrap();
        }

        let expected: Vec<TxHash> = kids.iter().map(|k| k.hash()).collect();
        assert_eq!(store.children_of(&a.hash()), expected.as_slice());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        store.insert(a.clone()).unwrap();

        let result = store.insert(a.clone());
        assert!(matches!(result, Err(Error::DuplicateTransaction(h)) if h == a.hash()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_parent_leaves_no_edges() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        store.insert(a.clone()).unwrap();

        let ghost = TxHash::from_bytes([0xee; 32]);
        let b = make_tx(2, vec![a.hash(), ghost]);
        let result = store.insert(b.clone());

        assert!(matches!(result, Err(Error::UnknownParent { parent, .. }) if parent == ghost));
        assert!(store.children_of(&a.hash()).is_empty());
        assert!(store.all_tips().contains(&a.hash()));
        assert!(!store.contains(&b.hash()));
    }

    #[test]
    fn test_remove_restores_parent_tip() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);
        store.insert(a.clone()).unwrap();
        store.insert(b.clone()).unwrap();

        let removed = store.remove(&b.hash()).unwrap();
        assert_eq!(removed.hash(), b.hash());
        assert!(store.all_tips().contains(&a.hash()));
        assert!(store.children_of(&a.hash()).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = LedgerStore::new();
        let missing = TxHash::from_bytes([1u8; 32]);
        assert!(matches!(store.get(&missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_stage_then_link_out_of_order() {
        let mut store = LedgerStore::new();
        let a = make_tx(1, vec![]);
        let b = make_tx(2, vec![a.hash()]);

        // Child arrives before its parent
        store.stage(b.clone()).unwrap();
        store.stage(a.clone()).unwrap();
        assert_eq!(store.link(&b.hash()), None);
        assert_eq!(store.link(&a.hash()), None);

        assert_eq!(store.children_of(&a.hash()), &[b.hash()]);
        assert_eq!(store.all_tips().len(), 1);
        assert!(store.all_tips().contains(&b.hash()));
    }
}
