//! Cycle guard
//!
//! Depth-first search over parent → child edges with an explicit visited set
//! and an explicit on-path set. Reaching a node that is still on the current
//! path means the graph loops back on itself.
//!
//! A well-formed insert cannot create a cycle (parents already exist, the new
//! node has no children yet), so the guard is an invariant check: it runs
//! after every provisional commit and over every staged import.

use crate::{store::LedgerStore, types::TxHash};
use std::collections::{HashMap, HashSet};

/// A directed approval edge: `(parent, child)`
pub type Edge = (TxHash, TxHash);

/// Structural integrity check for the tangle
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleGuard;

impl CycleGuard {
    /// Create a guard
    pub fn new() -> Self {
        Self
    }

    /// Would adding `candidate_edges` to the store's graph create a cycle?
    ///
    /// The store itself is not modified.
    pub fn creates_cycle(&self, store: &LedgerStore, candidate_edges: &[Edge]) -> bool {
        let mut overlay: HashMap<TxHash, Vec<TxHash>> = HashMap::new();
        for (parent, child) in candidate_edges {
            overlay.entry(*parent).or_default().push(*child);
        }

        let starts: Vec<TxHash> = store
            .hashes()
            .copied()
            .chain(candidate_edges.iter().flat_map(|(p, c)| [*p, *c]))
            .collect();

        let cycle = search(starts, |node| {
            let mut next = store.children_of(node).to_vec();
            if let Some(extra) = overlay.get(node) {
                next.extend(extra.iter().copied());
            }
            next
        });

        if let Some(path) = &cycle {
            tracing::warn!(len = path.len(), "Candidate edges would close a cycle");
        }
        cycle.is_some()
    }

    /// Is `start` part of, or able to reach, a cycle?
    pub fn has_cycle_from(&self, store: &LedgerStore, start: &TxHash) -> bool {
        search([*start], |node| store.children_of(node).to_vec()).is_some()
    }

    /// Search the whole graph; returns the nodes of one cycle, in edge order
    pub fn find_cycle(&self, store: &LedgerStore) -> Option<Vec<TxHash>> {
        // Sorted starts keep the reported cycle stable between runs
        let mut starts: Vec<TxHash> = store.hashes().copied().collect();
        starts.sort();
        search(starts, |node| store.children_of(node).to_vec())
    }
}

struct Frame {
    node: TxHash,
    successors: Vec<TxHash>,
    cursor: usize,
}

fn search<I, F>(starts: I, successors: F) -> Option<Vec<TxHash>>
where
    I: IntoIterator<Item = TxHash>,
    F: Fn(&TxHash) -> Vec<TxHash>,
{
    let mut visited: HashSet<TxHash> = HashSet::new();

    for start in starts {
        if !visited.insert(start) {
            continue;
        }

        let mut on_path: HashSet<TxHash> = HashSet::from([start]);
        let mut frames = vec![Frame {
            node: start,
            successors: successors(&start),
            cursor: 0,
        }];

        loop {
            let next = match frames.last_mut() {
                Some(frame) if frame.cursor < frame.successors.len() => {
                    frame.cursor += 1;
                    Some(frame.successors[frame.cursor - 1])
                }
                Some(_) => None,
                None => break,
            };

            match next {
                Some(node) if on_path.contains(&node) => {
                    let from = frames.iter().position(|f| f.node == node).unwrap_or(0);
                    return Some(frames[from..].iter().map(|f| f.node).collect());
                }
                Some(node) => {
                    if visited.insert(node) {
                        on_path.insert(node);
                        frames.push(Frame {
                            node,
                            successors: successors(&node),
                            cursor: 0,
                        });
                    }
                }
                None => {
                    if let Some(done) = frames.pop() {
                        on_path.remove(&done.node);
                    }
                }
            }
        }
    }

    None
}
