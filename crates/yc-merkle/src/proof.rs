use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::hash_pair;

/// Which side the sibling hash sits on when re-computing a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofSide {
    Left,
    Right,
}

/// A single step in a Merkle inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    pub hash: [u8; 32],
    pub side: ProofSide,
}

/// Evidence that transaction `tx_id` is committed to by a block's
/// `merkle_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub tx_id: Uuid,
    /// Hash of the transaction being proved.
    pub leaf_hash: [u8; 32],
    /// Sibling hashes from leaf to root.
    pub path: Vec<ProofNode>,
}

impl MerkleProof {
    /// Fold the leaf upward through every sibling.
    pub fn computed_root(&self) -> [u8; 32] {
        self.path.iter().fold(self.leaf_hash, |current, node| match node.side {
            ProofSide::Left => hash_pair(&node.hash, &current),
            ProofSide::Right => hash_pair(&current, &node.hash),
        })
    }

    /// Returns `true` if following the proof path reproduces `expected_root`.
    pub fn verify(&self, expected_root: &[u8; 32]) -> bool {
        &self.computed_root() == expected_root
    }
}
