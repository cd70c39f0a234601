//! Tangle Core
//!
//! Single-node DAG ledger: every transaction approves earlier unapproved
//! transactions ("tips") instead of joining a chain, and confirmation follows
//! from accumulated approval weight.
//!
//! # Architecture
//!
//! - **Ledger Store**: records by value, keyed by content hash, plus parent → child adjacency
//! - **Weight Propagator**: memoized cumulative weights, bumped along the ancestry on insert
//! - **Cycle Guard**: DFS with an on-path set; failed commits are rolled back
//! - **Tip Selector**: seeded weighted sampling without replacement
//! - **Consensus Validator**: threshold or all-parents-validated, explicit stack
//!
//! # Invariants
//!
//! - Every parent of every record is stored
//! - The graph is acyclic at all times
//! - The tip set is exactly the set of records without children
//! - Records are immutable apart from the validated flag

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod cycle;
pub mod error;
pub mod fee;
pub mod metrics;
pub mod persistence;
pub mod shared;
pub mod store;
pub mod tangle;
pub mod tips;
pub mod types;
pub mod weight;

// Re-exports
pub use config::Config;
pub use consensus::ConsensusReport;
pub use error::{Error, InsufficientTips, ParseError, Result};
pub use shared::SharedTangle;
pub use tangle::{ImportReport, InsertOutcome, RestoreReport, Tangle};
pub use types::{AccountId, NewTransaction, Transaction, TxHash, TxId};
