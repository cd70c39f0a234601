//! Error types for the tangle

use crate::types::TxHash;
use thiserror::Error;

/// Result type for tangle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Tangle errors
///
/// Every variant is recoverable: a failed insert leaves the store exactly as
/// it was before the call.
#[derive(Error, Debug)]
pub enum Error {
    /// A transaction with the same hash is already in the store
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(TxHash),

    /// A declared parent is not present in the store
    #[error("Unknown parent {parent} for transaction {child}")]
    UnknownParent {
        /// Transaction being inserted
        child: TxHash,
        /// Missing parent hash
        parent: TxHash,
    },

    /// Committing the transaction would have introduced a cycle (rolled back)
    #[error("Cycle detected while inserting transaction {0}")]
    CycleDetected(TxHash),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(TxHash),

    /// Transaction fields are malformed
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Malformed persisted record
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line of the transaction log that could not be decoded.
///
/// Loading skips the offending line and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error on line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number (0 when parsing a detached line)
    pub line: usize,
    /// What was wrong with it
    pub reason: String,
}

impl ParseError {
    /// Create a parse error for a detached line
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attach the line number the error came from
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// Fewer tips were available than parents requested.
///
/// Never fatal: the selector clamps to what is available.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Insufficient tips: requested {requested}, only {available} available")]
pub struct InsufficientTips {
    /// Parents requested
    pub requested: usize,
    /// Tips that existed at draw time
    pub available: usize,
}

impl Error {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Error::DuplicateTransaction(_) => "duplicate",
            Error::UnknownParent { .. } => "unknown_parent",
            Error::CycleDetected(_) => "cycle",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransaction(_) => "invalid",
            Error::Parse(_) => "parse",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }
}
