//! Thread-safe handle around a [`Tangle`]
//!
//! Inserts, imports and consensus passes take the write lock, so a pass never
//! overlaps an in-flight insert and every insert sees one consistent graph.
//! Plain reads share the read lock.

use crate::{
    consensus::ConsensusReport,
    tangle::{ImportReport, InsertOutcome, Tangle},
    types::{NewTransaction, Transaction, TxHash},
    Result,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{path::Path, sync::Arc};

/// Cloneable, lock-protected tangle
#[derive(Debug, Clone)]
pub struct SharedTangle {
    inner: Arc<RwLock<Tangle>>,
}

impl SharedTangle {
    /// Wrap an engine
    pub fn new(tangle: Tangle) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tangle)),
        }
    }

    /// Submit a new transfer
    pub fn submit(&self, new: NewTransaction) -> Result<InsertOutcome> {
        self.inner.write().submit(new)
    }

    /// Commit a fully built record
    pub fn insert(&self, tx: Transaction) -> Result<TxHash> {
        self.inner.write().insert(tx)
    }

    /// Commit a batch of records
    pub fn import(&self, records: Vec<Transaction>) -> ImportReport {
        self.inner.write().import(records)
    }

    /// Run a consensus pass with the configured threshold
    pub fn run_consensus(&self) -> ConsensusReport {
        self.inner.write().run_consensus()
    }

    /// Cumulative weight (takes the write lock: weights are memoized)
    pub fn weight_of(&self, hash: &TxHash) -> Option<u64> {
        self.inner.write().weight_of(hash)
    }

    /// Copy of a record
    pub fn get(&self, hash: &TxHash) -> Result<Transaction> {
        self.inner.read().get(hash).cloned()
    }

    /// Current tips, sorted
    pub fn tips(&self) -> Vec<TxHash> {
        self.inner.read().tips()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the tangle is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Save every record to a log file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.inner.read().save_to(path)
    }

    /// Shared access for multi-step reads
    pub fn read(&self) -> RwLockReadGuard<'_, Tangle> {
        self.inner.read()
    }

    /// Exclusive access for multi-step updates
    pub fn write(&self) -> RwLockWriteGuard<'_, Tangle> {
        self.inner.write()
    }
}

impl From<Tangle> for SharedTangle {
    fn from(tangle: Tangle) -> Self {
        Self::new(tangle)
    }
}
