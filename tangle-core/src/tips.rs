//! Tip selection
//!
//! Parents for a new transaction are drawn from the current tips by weighted
//! sampling without replacement. A tip's selection weight is
//!
//! ```text
//! cumulative_weight × exp(-age / window) × (1 + ln(1 + fee)) × ln(1 + amount)
//! ```
//!
//! so well approved, recent, high fee, high value tips are preferred. The
//! random source is passed in by the caller; tips are sorted before drawing
//! so a seeded generator always yields the same parents.

use crate::{
    error::InsufficientTips,
    store::LedgerStore,
    types::{Transaction, TxHash},
    weight::WeightPropagator,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Parents chosen for one insert
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    /// Distinct tip hashes in draw order
    pub parents: Vec<TxHash>,

    /// Set when fewer tips existed than were requested
    #[serde(skip)]
    pub warning: Option<InsufficientTips>,
}

/// Weighted random tip selector
#[derive(Debug, Clone, Copy)]
pub struct TipSelector {
    decay_window_secs: f64,
}

impl Default for TipSelector {
    fn default() -> Self {
        Self::new(3600.0)
    }
}

impl TipSelector {
    /// Selector whose recency decay uses `decay_window_secs`
    pub fn new(decay_window_secs: f64) -> Self {
        Self { decay_window_secs }
    }

    /// Draw up to `desired` distinct parents from the current tips.
    ///
    /// Never fails: an empty store yields no parents, and a request larger
    /// than the tip set is clamped and reported through
    /// [`Selection::warning`].
    pub fn select_parents<R: Rng + ?Sized>(
        &self,
        store: &LedgerStore,
        weights: &mut WeightPropagator,
        desired: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Selection {
        if desired == 0 {
            return Selection::default();
        }

        let mut tips: Vec<TxHash> = store.all_tips().iter().copied().collect();
        if tips.is_empty() {
            return Selection::default();
        }
        tips.sort();

        let mut warning = None;
        if tips.len() < desired {
            tracing::warn!(
                requested = desired,
                available = tips.len(),
                "Insufficient tips, clamping parent count"
            );
            warning = Some(InsufficientTips {
                requested: desired,
                available: tips.len(),
            });
        }
        let count = desired.min(tips.len());

        let scores: Vec<f64> = tips
            .iter()
            .map(|hash| match store.get(hash) {
                Ok(tx) => {
                    let cumulative = weights.weight_of(store, hash).unwrap_or(1);
                    self.selection_weight(tx, cumulative, now)
                }
                Err(_) => 0.0,
            })
            .collect();

        let mut used = vec![false; tips.len()];
        let mut parents = Vec::with_capacity(count);

        for _ in 0..count {
            let index = draw(&scores, &used, rng);
            used[index] = true;
            parents.push(tips[index]);
        }

        tracing::debug!(parents = ?parents, tips = tips.len(), "Selected parents");

        Selection { parents, warning }
    }

    /// Attractiveness of one tip. Non-finite or negative results count as 0.
    pub fn selection_weight(&self, tx: &Transaction, cumulative_weight: u64, now: DateTime<Utc>) -> f64 {
        let age = (now - tx.timestamp()).num_milliseconds().max(0) as f64 / 1000.0;
        let recency = (-age / self.decay_window_secs).exp();
        let fee_factor = 1.0 + tx.fee_f64().max(0.0).ln_1p();
        let value_factor = tx.amount_f64().max(0.0).ln_1p();

        let weight = cumulative_weight as f64 * recency * fee_factor * value_factor;
        if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        }
    }
}

/// Pick one unused index proportionally to its score.
///
/// Falls back to a uniform pick when every remaining score is zero.
fn draw<R: Rng + ?Sized>(scores: &[f64], used: &[bool], rng: &mut R) -> usize {
    let remaining: Vec<usize> = (0..scores.len()).filter(|i| !used[*i]).collect();
    let total: f64 = remaining.iter().map(|i| scores[*i]).sum();

    if !(total.is_finite() && total > 0.0) {
        return remaining[rng.gen_range(0..remaining.len())];
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = remaining[0];
    for index in remaining {
        if scores[index] <= 0.0 {
            continue;
        }
        last_positive = index;
        cumulative += scores[index];
        if cumulative > target {
            return index;
        }
    }

    // Rounding left target just past the end
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, TxId};
    use chrono::{Duration, TimeZone};
    use rand::{rngs::StdRng, SeedableRng};
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_100, 0).unwrap()
    }

    fn tx(id: u64, amount: Decimal, fee: Decimal, age_secs: i64, parents: Vec<TxHash>) -> Transaction {
        Transaction::create(
            TxId::new(id),
            AccountId::new("alice"),
            AccountId::new("bob"),
            amount,
            fee,
            now() - Duration::seconds(age_secs),
            parents,
        )
        .unwrap()
    }

    fn setup(records: &[Transaction]) -> (LedgerStore, WeightPropagator) {
        let mut store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        for record in records {
            store.insert(record.clone()).unwrap();
            weights.on_attach(&store, &record.hash());
        }
        (store, weights)
    }

    #[test]
    fn test_zero_requested_is_empty() {
        let (store, mut weights) = setup(&[tx(1, Decimal::ONE, Decimal::ZERO, 0, vec![])]);
        let mut rng = StdRng::seed_from_u64(1);
        let selection = TipSelector::default().select_parents(&store, &mut weights, 0, now(), &mut rng);
        assert!(selection.parents.is_empty());
        assert!(selection.warning.is_none());
    }

    #[test]
    fn test_empty_store_has_no_parents() {
        let store = LedgerStore::new();
        let mut weights = WeightPropagator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let selection = TipSelector::default().select_parents(&store, &mut weights, 2, now(), &mut rng);
        assert!(selection.parents.is_empty());
        assert!(selection.warning.is_none());
    }

    #[test]
    fn test_clamps_to_available_tips() {
        let a = tx(1, Decimal::new(10, 0), Decimal::ZERO, 20, vec![]);
        let b = tx(2, Decimal::new(10, 0), Decimal::ZERO, 10, vec![a.hash()]);
        let (store, mut weights) = setup(&[a, b.clone()]);
        let mut rng = StdRng::seed_from_u64(7);

        let selection = TipSelector::default().select_parents(&store, &mut weights, 2, now(), &mut rng);
        assert_eq!(selection.parents, vec![b.hash()]);
        assert_eq!(
            selection.warning,
            Some(InsufficientTips {
                requested: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_parents_are_distinct_tips() {
        let records: Vec<Transaction> = (1..=6)
            .map(|i| tx(i, Decimal::new(i as i64 * 10, 0), Decimal::ONE, i as i64, vec![]))
            .collect();
        let (store, mut weights) = setup(&records);
        let tips = store.all_tips().clone();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection =
                TipSelector::default().select_parents(&store, &mut weights, 3, now(), &mut rng);
            let unique: HashSet<TxHash> = selection.parents.iter().copied().collect();
            assert_eq!(selection.parents.len(), 3);
            assert_eq!(unique.len(), 3);
            assert!(unique.is_subset(&tips));
        }
    }

    #[test]
    fn test_same_seed_same_parents() {
        let records: Vec<Transaction> = (1..=8)
            .map(|i| tx(i, Decimal::new(100, 0), Decimal::ONE, i as i64 * 60, vec![]))
            .collect();
        let (store, mut weights) = setup(&records);
        let selector = TipSelector::default();

        let first = selector.select_parents(&store, &mut weights, 2, now(), &mut StdRng::seed_from_u64(42));
        let second = selector.select_parents(&store, &mut weights, 2, now(), &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        // Zero amounts make every selection weight zero
        let records: Vec<Transaction> = (1..=4)
            .map(|i| tx(i, Decimal::ZERO, Decimal::ZERO, 0, vec![]))
            .collect();
        let (store, mut weights) = setup(&records);
        let mut rng = StdRng::seed_from_u64(3);

        let selection = TipSelector::default().select_parents(&store, &mut weights, 4, now(), &mut rng);
        let unique: HashSet<TxHash> = selection.parents.iter().copied().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_valuable_tip_is_preferred() {
        let rich = tx(1, Decimal::new(1_000_000, 0), Decimal::new(50, 0), 0, vec![]);
        let poor = tx(2, Decimal::new(1, 2), Decimal::ZERO, 0, vec![]);
        let (store, mut weights) = setup(&[rich.clone(), poor]);
        let selector = TipSelector::default();
        let mut rng = StdRng::seed_from_u64(11);

        let picks = (0..500)
            .filter(|_| {
                let selection = selector.select_parents(&store, &mut weights, 1, now(), &mut rng);
                selection.parents == vec![rich.hash()]
            })
            .count();
        assert!(picks > 450, "rich tip picked {} times", picks);
    }

    #[test]
    fn test_selection_weight_decays_with_age() {
        let selector = TipSelector::default();
        let fresh = tx(1, Decimal::new(100, 0), Decimal::ONE, 0, vec![]);
        let stale = tx(2, Decimal::new(100, 0), Decimal::ONE, 7200, vec![]);

        let w_fresh = selector.selection_weight(&fresh, 1, now());
        let w_stale = selector.selection_weight(&stale, 1, now());
        assert!(w_fresh > w_stale);
        assert!((w_stale / w_fresh - (-2.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let selector = TipSelector::default();
        let ahead = tx(1, Decimal::new(100, 0), Decimal::ONE, -600, vec![]);
        let current = tx(2, Decimal::new(100, 0), Decimal::ONE, 0, vec![]);
        assert_eq!(
            selector.selection_weight(&ahead, 1, now()),
            selector.selection_weight(&current, 1, now())
        );
    }
}
