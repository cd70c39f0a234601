//! Core types for the tangle
//!
//! All types are designed for:
//! - Identity by content hash (the hash is the key everywhere)
//! - Logical references between records (hashes, never pointers)
//! - Exact arithmetic (Decimal for money)

use crate::crypto::hash_transaction;
use crate::error::{Error, ParseError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Content hash of a transaction (SHA-256)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty to tell hashes apart in logs
        write!(f, "TxHash({}…)", &self.to_hex()[..16])
    }
}

impl FromStr for TxHash {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| ParseError::new(format!("invalid hash {:?}: {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseError::new(format!("hash {:?} is not 32 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction identifier issued by a [`SequenceGenerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    /// Create from a raw sequence number
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw sequence number
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source, owned by one tangle instance
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    next: u64,
}

impl SequenceGenerator {
    /// Start issuing ids at `first`
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Issue the next id
    pub fn next_id(&mut self) -> TxId {
        let id = TxId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Make sure ids issued later never collide with `id`
    pub fn observe(&mut self, id: TxId) {
        if id.0 >= self.next {
            self.next = id.0.saturating_add(1);
        }
    }

    /// Id that will be issued next
    pub fn peek(&self) -> TxId {
        TxId(self.next)
    }
}

/// Account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Account names end up as fields of the comma separated log
    fn check(&self, role: &str) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::InvalidTransaction(format!("{} account is empty", role)));
        }
        if self.0.contains(&[',', '\n', '\r'][..]) {
            return Err(Error::InvalidTransaction(format!(
                "{} account {:?} contains a separator",
                role, self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transfer submitted to the tangle before fee, id and parents are known
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Sender account
    pub sender: AccountId,

    /// Receiver account
    pub receiver: AccountId,

    /// Amount transferred (non-negative)
    pub amount: Decimal,

    /// Opaque signature / proof attached by an external signer
    #[serde(default)]
    pub attestation: Option<String>,
}

impl NewTransaction {
    /// Unsigned transfer
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: Decimal) -> Self {
        Self {
            sender: AccountId::new(sender),
            receiver: AccountId::new(receiver),
            amount,
            attestation: None,
        }
    }

    /// Attach an opaque attestation
    pub fn with_attestation(mut self, attestation: impl Into<String>) -> Self {
        self.attestation = Some(attestation.into());
        self
    }
}

/// A transaction record as owned by the ledger store
///
/// Business fields are fixed at creation; only the `validated` flag changes
/// afterwards. Serializable for reporting; records are only ever rebuilt
/// through [`Transaction::create`] so the hash always matches the fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    id: TxId,
    sender: AccountId,
    receiver: AccountId,
    amount: Decimal,
    fee: Decimal,
    timestamp: DateTime<Utc>,
    hash: TxHash,
    parents: Vec<TxHash>,
    attestation: Option<String>,
    validated: bool,
}

impl Transaction {
    /// Create a record and compute its hash.
    ///
    /// The timestamp is truncated to whole seconds, the resolution of the log.
    pub fn create(
        id: TxId,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        fee: Decimal,
        timestamp: DateTime<Utc>,
        parents: Vec<TxHash>,
    ) -> Result<Self> {
        sender.check("sender")?;
        receiver.check("receiver")?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(Error::InvalidTransaction(format!("negative amount {}", amount)));
        }
        if fee.is_sign_negative() && !fee.is_zero() {
            return Err(Error::InvalidTransaction(format!("negative fee {}", fee)));
        }
        let mut unique = parents.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != parents.len() {
            return Err(Error::InvalidTransaction("duplicate parent reference".to_string()));
        }

        let timestamp = Utc
            .timestamp_opt(timestamp.timestamp(), 0)
            .single()
            .ok_or_else(|| Error::InvalidTransaction("timestamp out of range".to_string()))?;
        let hash = hash_transaction(id, &sender, &receiver, amount, fee, timestamp.timestamp());

        Ok(Self {
            id,
            sender,
            receiver,
            amount,
            fee,
            timestamp,
            hash,
            parents,
            attestation: None,
            validated: false,
        })
    }

    /// Attach an opaque attestation (not part of the hash)
    pub fn with_attestation(mut self, attestation: Option<String>) -> Self {
        self.attestation = attestation;
        self
    }

    /// Transaction id
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Sender account
    pub fn sender(&self) -> &AccountId {
        &self.sender
    }

    /// Receiver account
    pub fn receiver(&self) -> &AccountId {
        &self.receiver
    }

    /// Amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Fee
    pub fn fee(&self) -> Decimal {
        self.fee
    }

    /// Creation timestamp (whole seconds)
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Content hash
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Parent hashes in selection order
    pub fn parents(&self) -> &[TxHash] {
        &self.parents
    }

    /// Attestation attached by the signer, if any
    pub fn attestation(&self) -> Option<&str> {
        self.attestation.as_deref()
    }

    /// Whether consensus has confirmed this transaction
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub(crate) fn mark_validated(&mut self) {
        self.validated = true;
    }

    /// Amount as a float for weighting
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    /// Fee as a float for weighting
    pub fn fee_f64(&self) -> f64 {
        self.fee.to_f64().unwrap_or(0.0)
    }
}
