//! BLAKE3 hashing, id derivation and merkle roots

use pchain_core::{Id, TxId, UtxoId};

/// Compute BLAKE3 hash of data
pub fn blake3_hash(data: &[u8]) -> Id {
    let hash = blake3::hash(data);
    Id::from_bytes(*hash.as_bytes())
}

/// Default hash function (BLAKE3)
pub fn hash(data: &[u8]) -> Id {
    blake3_hash(data)
}

/// Hash multiple pieces of data
pub fn hash_multiple(parts: &[&[u8]]) -> Id {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    Id::from_bytes(*hash.as_bytes())
}

/// ID of the `index`-th output produced by transaction `tx_id`
pub fn derive_utxo_id(tx_id: &TxId, index: u32) -> UtxoId {
    hash_multiple(&[b"utxo:", tx_id.as_bytes(), &index.to_be_bytes()])
}

/// Merkle tree root computation
pub fn merkle_root(leaves: &[Id]) -> Id {
    if leaves.is_empty() {
        return Id::ZERO;
    }

    let mut current_level: Vec<Id> = leaves.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| {
                // Odd number: hash with itself
                let right = chunk.get(1).unwrap_or(&chunk[0]);
                hash_multiple(&[chunk[0].as_bytes(), right.as_bytes()])
            })
            .collect();
    }

    current_level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_order_sensitive() {
        let data = b"platform chain";
        assert_eq!(blake3_hash(data), blake3_hash(data));
        assert_ne!(hash(data), Id::ZERO);
        assert_eq!(hash_multiple(&[b"platform ", b"chain"]), hash(data));
        assert_ne!(hash_multiple(&[b"chain", b"platform "]), hash(data));
    }

    #[test]
    fn test_utxo_ids_are_distinct_per_index() {
        let tx_id = hash(b"tx");
        assert_ne!(derive_utxo_id(&tx_id, 0), derive_utxo_id(&tx_id, 1));
        assert_eq!(derive_utxo_id(&tx_id, 0), derive_utxo_id(&tx_id, 0));
        assert_ne!(derive_utxo_id(&tx_id, 0), derive_utxo_id(&hash(b"other"), 0));
    }

    #[test]
    fn test_merkle_root() {
        let leaves = vec![hash(b"leaf1"), hash(b"leaf2"), hash(b"leaf3")];

        let root = merkle_root(&leaves);
        assert_ne!(root, Id::ZERO);
        assert_eq!(root, merkle_root(&leaves));
        assert_ne!(root, merkle_root(&leaves[..2]));
        assert_eq!(merkle_root(&leaves[..1]), leaves[0]);
        assert_eq!(merkle_root(&[]), Id::ZERO);
    }
}
