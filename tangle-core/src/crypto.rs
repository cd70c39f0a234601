//! Content hashing for transactions
//!
//! Signatures and proof-of-work are produced and checked outside the engine;
//! the only cryptography done here is the SHA-256 identity of a record.

use crate::types::{AccountId, TxHash, TxId};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Domain tag mixed into every transaction hash
const TX_HASH_DOMAIN: &[u8] = b"tangle.tx.v1";

/// Hash the defining fields of a transaction.
///
/// Strings are length-prefixed so adjacent fields cannot bleed into each
/// other. Decimals are normalized first, so `1.5` and `1.50` hash alike.
pub fn hash_transaction(
    id: TxId,
    sender: &AccountId,
    receiver: &AccountId,
    amount: Decimal,
    fee: Decimal,
    timestamp_secs: i64,
) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(TX_HASH_DOMAIN);
    hasher.update(id.value().to_be_bytes());
    update_field(&mut hasher, sender.as_str().as_bytes());
    update_field(&mut hasher, receiver.as_str().as_bytes());
    update_field(&mut hasher, amount.normalize().to_string().as_bytes());
    update_field(&mut hasher, fee.normalize().to_string().as_bytes());
    hasher.update(timestamp_secs.to_be_bytes());

    TxHash::from_bytes(hasher.finalize().into())
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with(amount: Decimal, sender: &str, receiver: &str) -> TxHash {
        hash_transaction(
            TxId::new(7),
            &AccountId::new(sender),
            &AccountId::new(receiver),
            amount,
            Decimal::ZERO,
            1_700_000_000,
        )
    }

    #[test]
    fn test_hash_deterministic() {
        let a = hash_with(Decimal::new(100, 0), "alice", "bob");
        let b = hash_with(Decimal::new(100, 0), "alice", "bob");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_normalizes_decimal_scale() {
        let a = hash_with(Decimal::new(15, 1), "alice", "bob");
        let b = hash_with(Decimal::new(150, 2), "alice", "bob");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_field_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = hash_with(Decimal::ONE, "ab", "c");
        let b = hash_with(Decimal::ONE, "a", "bc");
        assert_ne!(a, b);
    }
}
