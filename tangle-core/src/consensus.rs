//! Consensus validation
//!
//! A transaction is validated when its cumulative weight reaches the
//! threshold, or when it has at least one parent and every parent validates.
//! A parentless transaction below the threshold is not validated.
//!
//! The walk is a post-order over parents using an explicit stack; each hash
//! is decided once per pass. Validation only ever adds flags: a validated
//! transaction stays validated.

use crate::{store::LedgerStore, types::TxHash, weight::WeightPropagator};
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of one consensus pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsensusReport {
    /// Transactions decided during the pass
    pub examined: usize,

    /// Transactions that became validated in this pass
    pub newly_validated: usize,

    /// Validated transactions in the store after the pass
    pub validated_total: usize,
}

/// Threshold based validator
#[derive(Debug, Clone, Copy)]
pub struct ConsensusValidator {
    threshold: f64,
}

impl ConsensusValidator {
    /// Validator comparing cumulative weights against `threshold`
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Configured threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide every transaction in the store and mark the validated ones
    pub fn run(&self, store: &mut LedgerStore, weights: &mut WeightPropagator) -> ConsensusReport {
        let decisions = self.decide_all(store, weights);

        let mut newly_validated = 0;
        for (hash, validated) in &decisions {
            if !*validated {
                continue;
            }
            if let Some(tx) = store.get_mut(hash) {
                if !tx.is_validated() {
                    tx.mark_validated();
                    newly_validated += 1;
                }
            }
        }

        let report = ConsensusReport {
            examined: decisions.len(),
            newly_validated,
            validated_total: store.transactions().filter(|tx| tx.is_validated()).count(),
        };

        tracing::info!(
            threshold = self.threshold,
            examined = report.examined,
            newly_validated = report.newly_validated,
            validated_total = report.validated_total,
            "Consensus pass complete"
        );

        report
    }

    fn decide_all(&self, store: &LedgerStore, weights: &mut WeightPropagator) -> HashMap<TxHash, bool> {
        let mut decided: HashMap<TxHash, bool> = HashMap::with_capacity(store.len());

        let mut roots: Vec<TxHash> = store.hashes().copied().collect();
        roots.sort();

        for root in roots {
            if decided.contains_key(&root) {
                continue;
            }

            // (hash, parents already pushed)
            let mut stack: Vec<(TxHash, bool)> = vec![(root, false)];

            while let Some((hash, expanded)) = stack.pop() {
                if decided.contains_key(&hash) {
                    continue;
                }

                let tx = match store.get(&hash) {
                    Ok(tx) => tx,
                    Err(_) => {
                        decided.insert(hash, false);
                        continue;
                    }
                };

                if expanded {
                    let all_parents = tx
                        .parents()
                        .iter()
                        .all(|p| decided.get(p).copied().unwrap_or(false));
                    decided.insert(hash, all_parents);
                    continue;
                }

                if tx.is_validated() || self.meets_threshold(store, weights, &hash) {
                    decided.insert(hash, true);
                } else if tx.parents().is_empty() {
                    decided.insert(hash, false);
                } else {
                    stack.push((hash, true));
                    stack.extend(
                        tx.parents()
                            .iter()
                            .filter(|p| !decided.contains_key(*p))
                            .map(|p| (*p, false)),
                    );
                }
            }
        }

        decided
    }

    fn meets_threshold(&self, store: &LedgerStore, weights: &mut WeightPropagator, hash: &TxHash) -> bool {
        weights
            .weight_of(store, hash)
            .map(|w| w as f64 >= self.threshold)
            .unwrap_or(false)
    }
}
