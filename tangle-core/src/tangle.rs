//! Tangle engine
//!
//! Ties the store, weight cache, cycle guard, tip selector and consensus
//! validator into one single-writer API.
//!
//! # Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use tangle_core::{Config, NewTransaction, Tangle};
//!
//! fn main() -> tangle_core::Result<()> {
//!     let mut tangle = Tangle::new(Config::default())?;
//!
//!     let outcome = tangle.submit(NewTransaction::new("alice", "bob", Decimal::new(250, 0)))?;
//!     let weight = tangle.weight_of(&outcome.hash);
//!     let report = tangle.run_consensus();
//!
//!     tangle.save_to("./data/tangle.log")?;
//!     Ok(())
//! }
//! ```

use crate::{
    consensus::{ConsensusReport, ConsensusValidator},
    cycle::{CycleGuard, Edge},
    error::{InsufficientTips, ParseError},
    metrics::TangleMetrics,
    persistence::TransactionLog,
    store::LedgerStore,
    tips::{Selection, TipSelector},
    types::{NewTransaction, SequenceGenerator, Transaction, TxHash, TxId},
    weight::WeightPropagator,
    Config, Error, Result,
};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::{collections::HashSet, fmt, path::Path, time::Instant};

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOutcome {
    /// Hash of the committed transaction
    pub hash: TxHash,

    /// Parents it approves, in draw order
    pub parents: Vec<TxHash>,

    /// Set when fewer parents than configured were available
    #[serde(skip)]
    pub warning: Option<InsufficientTips>,
}

/// Result of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Records committed
    pub imported: usize,

    /// Records whose hash was already present
    pub duplicates: Vec<TxHash>,

    /// Records with a missing parent, and everything approving them
    pub unknown_parent: Vec<TxHash>,

    /// Records on a cycle, and everything approving them
    pub cyclic: Vec<TxHash>,
}

impl ImportReport {
    /// Number of records left out
    pub fn rejected(&self) -> usize {
        self.duplicates.len() + self.unknown_parent.len() + self.cyclic.len()
    }
}

/// Result of restoring a log file
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Lines that could not be decoded
    pub skipped: Vec<ParseError>,

    /// What happened to the decoded records
    pub import: ImportReport,
}

/// The tangle ledger
pub struct Tangle {
    store: LedgerStore,
    weights: WeightPropagator,
    guard: CycleGuard,
    selector: TipSelector,
    validator: ConsensusValidator,
    sequence: SequenceGenerator,
    rng: StdRng,
    config: Config,
    metrics: TangleMetrics,
}

impl Tangle {
    /// Create an empty tangle.
    ///
    /// Tip selection is seeded from `config.tip_selection.seed` when set,
    /// otherwise from OS entropy.
    pub fn new(config: Config) -> Result<Self> {
        let rng = match config.tip_selection.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Create an empty tangle drawing parents from `rng`
    pub fn with_rng(config: Config, rng: StdRng) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store: LedgerStore::new(),
            weights: WeightPropagator::new(),
            guard: CycleGuard::new(),
            selector: TipSelector::new(config.tip_selection.decay_window_secs),
            validator: ConsensusValidator::new(config.tangle.consensus_threshold),
            sequence: SequenceGenerator::default(),
            rng,
            metrics: TangleMetrics::new()?,
            config,
        })
    }

    // Write operations

    /// Price, attach and commit a new transfer
    pub fn submit(&mut self, new: NewTransaction) -> Result<InsertOutcome> {
        self.submit_at(new, Utc::now())
    }

    /// [`Tangle::submit`] with an explicit clock
    pub fn submit_at(&mut self, new: NewTransaction, now: DateTime<Utc>) -> Result<InsertOutcome> {
        let fee = self.config.fees.fee_for(new.amount).map_err(|e| self.reject(e))?;
        let selection = self.select_parents_at(self.config.tangle.parent_count, now);

        let tx = Transaction::create(
            self.sequence.peek(),
            new.sender,
            new.receiver,
            new.amount,
            fee,
            now,
            selection.parents.clone(),
        )
        .map_err(|e| self.reject(e))?
        .with_attestation(new.attestation);

        let hash = self.insert(tx)?;

        Ok(InsertOutcome {
            hash,
            parents: selection.parents,
            warning: selection.warning,
        })
    }

    /// Commit a fully built record.
    ///
    /// All parents must already be stored. A commit that would leave a cycle
    /// is rolled back and reported as [`Error::CycleDetected`].
    pub fn insert(&mut self, tx: Transaction) -> Result<TxHash> {
        let hash = tx.hash();
        let id = tx.id();

        self.store.insert(tx).map_err(|e| self.reject(e))?;

        if self.guard.has_cycle_from(&self.store, &hash) {
            self.store.remove(&hash);
            return Err(self.reject(Error::CycleDetected(hash)));
        }

        self.weights.on_attach(&self.store, &hash);
        self.sequence.observe(id);
        self.metrics.record_inserted(1);
        self.metrics.update_tips(self.store.all_tips().len());

        tracing::debug!(%hash, %id, "Transaction attached");

        if self.config.tangle.consensus_on_insert {
            self.run_consensus();
        }

        Ok(hash)
    }

    /// Commit a batch of records in any order.
    ///
    /// Adjacency is rebuilt from parent lists alone. Records with a missing
    /// parent, records on a cycle, and everything approving either are left
    /// out; the rest is committed at once. A batch that is rejected entirely
    /// leaves the tangle unchanged.
    pub fn import<I>(&mut self, records: I) -> ImportReport
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut report = ImportReport::default();
        let mut staged = self.store.clone();
        let mut batch: Vec<(TxHash, TxId)> = Vec::new();

        for tx in records {
            let (hash, id) = (tx.hash(), tx.id());
            match staged.stage(tx) {
                Ok(()) => batch.push((hash, id)),
                Err(_) => report.duplicates.push(hash),
            }
        }

        let orphans: Vec<TxHash> = batch
            .iter()
            .filter(|(hash, _)| staged.link(hash).is_some())
            .map(|(hash, _)| *hash)
            .collect();
        report.unknown_parent = prune_with_descendants(&mut staged, &orphans);

        while let Some(cycle) = self.guard.find_cycle(&staged) {
            tracing::warn!(len = cycle.len(), first = %cycle[0], "Dropping cyclic records from import");
            report.cyclic.extend(prune_with_descendants(&mut staged, &cycle));
        }

        let committed: Vec<_> = batch.iter().filter(|(hash, _)| staged.contains(hash)).collect();
        report.imported = committed.len();

        if report.imported > 0 {
            self.store = staged;
            self.weights.invalidate_all();
            for (_, id) in &committed {
                self.sequence.observe(*id);
            }
        }

        self.metrics.record_inserted(report.imported);
        for (reason, count) in [
            ("duplicate", report.duplicates.len()),
            ("unknown_parent", report.unknown_parent.len()),
            ("cycle", report.cyclic.len()),
        ] {
            for _ in 0..count {
                self.metrics.record_rejection(reason);
            }
        }
        self.metrics.update_tips(self.store.all_tips().len());

        tracing::info!(
            imported = report.imported,
            duplicates = report.duplicates.len(),
            unknown_parent = report.unknown_parent.len(),
            cyclic = report.cyclic.len(),
            "Import complete"
        );

        report
    }

    /// Run a consensus pass with the configured threshold
    pub fn run_consensus(&mut self) -> ConsensusReport {
        let validator = self.validator;
        self.consensus_pass(validator)
    }

    /// Run a consensus pass with an explicit threshold
    pub fn run_consensus_with(&mut self, threshold: f64) -> Result<ConsensusReport> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::Config(format!(
                "consensus threshold must be a positive number, got {}",
                threshold
            )));
        }
        Ok(self.consensus_pass(ConsensusValidator::new(threshold)))
    }

    fn consensus_pass(&mut self, validator: ConsensusValidator) -> ConsensusReport {
        let start = Instant::now();
        let report = validator.run(&mut self.store, &mut self.weights);
        self.metrics
            .record_consensus(start.elapsed().as_secs_f64(), report.validated_total);
        report
    }

    /// Draw parents for a transaction created now
    pub fn select_parents(&mut self, desired: usize) -> Selection {
        self.select_parents_at(desired, Utc::now())
    }

    /// [`Tangle::select_parents`] with an explicit clock
    pub fn select_parents_at(&mut self, desired: usize, now: DateTime<Utc>) -> Selection {
        let selection =
            self.selector
                .select_parents(&self.store, &mut self.weights, desired, now, &mut self.rng);
        if selection.warning.is_some() {
            self.metrics.record_insufficient_tips();
        }
        selection
    }

    /// Cumulative weight of `hash`, `None` when it is not stored
    pub fn weight_of(&mut self, hash: &TxHash) -> Option<u64> {
        self.weights.weight_of(&self.store, hash)
    }

    // Persistence

    /// Load a log file and import its records
    pub fn load_from(&mut self, path: impl AsRef<Path>) -> Result<RestoreReport> {
        let loaded = TransactionLog::load(path)?;
        let import = self.import(loaded.records);
        Ok(RestoreReport {
            skipped: loaded.skipped,
            import,
        })
    }

    /// Write every stored record to a log file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        TransactionLog::save(path, self.store.transactions())
    }

    // Read operations

    /// Get a record by hash
    pub fn get(&self, hash: &TxHash) -> Result<&Transaction> {
        self.store.get(hash)
    }

    /// Direct approvers of `hash`
    pub fn children_of(&self, hash: &TxHash) -> &[TxHash] {
        self.store.children_of(hash)
    }

    /// Current tips, sorted
    pub fn tips(&self) -> Vec<TxHash> {
        let mut tips: Vec<TxHash> = self.store.all_tips().iter().copied().collect();
        tips.sort();
        tips
    }

    /// Every record, for balance calculators and reporting
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.store.transactions()
    }

    /// Would these extra edges close a cycle?
    pub fn creates_cycle(&self, candidate_edges: &[Edge]) -> bool {
        self.guard.creates_cycle(&self.store, candidate_edges)
    }

    /// Underlying store
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the tangle is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &TangleMetrics {
        &self.metrics
    }

    fn reject(&self, err: Error) -> Error {
        self.metrics.record_rejection(err.reason());
        tracing::warn!(reason = err.reason(), error = %err, "Insert rejected");
        err
    }
}

impl fmt::Debug for Tangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tangle")
            .field("transactions", &self.store.len())
            .field("tips", &self.store.all_tips().len())
            .field("next_id", &self.sequence.peek())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Remove `roots` and every record approving them; returns what was removed
fn prune_with_descendants(store: &mut LedgerStore, roots: &[TxHash]) -> Vec<TxHash> {
    let mut doomed: Vec<TxHash> = Vec::new();
    let mut seen: HashSet<TxHash> = HashSet::new();
    let mut stack: Vec<TxHash> = roots.to_vec();

    while let Some(hash) = stack.pop() {
        if !seen.insert(hash) {
            continue;
        }
        doomed.push(hash);
        stack.extend(store.children_of(&hash).iter().copied());
    }

    for hash in &doomed {
        store.remove(hash);
    }
    doomed
}
