use sha2::{Digest, Sha256};
use uuid::Uuid;
use yc_transaction::Transaction;

use crate::{
    error::MerkleError,
    proof::{MerkleProof, ProofNode, ProofSide},
};

/// Root committed by a block that carries no transactions.
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

/// A binary Merkle tree over a block's transactions, in block order.
///
/// Leaves are [`Transaction::hash`] values; parents are SHA-256 of
/// `left || right`.  An odd level duplicates its last hash.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    ids: Vec<Uuid>,
    /// `levels[0]` holds the leaves, the last level the single root.
    levels: Vec<Vec<[u8; 32]>>,
}

pub(crate) fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Merkle root of `transactions`, or [`EMPTY_ROOT`] for an empty slice.
pub fn merkle_root(transactions: &[Transaction]) -> Result<[u8; 32], MerkleError> {
    if transactions.is_empty() {
        return Ok(EMPTY_ROOT);
    }
    MerkleTree::new(transactions)?.root_hash()
}

impl MerkleTree {
    /// Build a tree from `transactions`.  Fails on an empty slice or when a
    /// transaction cannot be encoded.
    pub fn new(transactions: &[Transaction]) -> Result<Self, MerkleError> {
        if transactions.is_empty() {
            return Err(MerkleError::Empty);
        }

        let mut level: Vec<[u8; 32]> = transactions
            .iter()
            .map(Transaction::hash)
            .collect::<Result<_, _>>()?;
        let ids = transactions.iter().map(|tx| tx.id).collect();

        let mut levels = Vec::new();
        while level.len() > 1 {
            let parent = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [last] => hash_pair(last, last),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(std::mem::replace(&mut level, parent));
        }
        levels.push(level);

        Ok(Self { ids, levels })
    }

    pub fn root_hash(&self) -> Result<[u8; 32], MerkleError> {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .ok_or(MerkleError::Empty)
    }

    pub fn root_hash_hex(&self) -> Result<String, MerkleError> {
        Ok(hex::encode(self.root_hash()?))
    }

    /// Build an inclusion proof for the transaction with id `tx_id`.
    pub fn proof(&self, tx_id: Uuid) -> Result<MerkleProof, MerkleError> {
        let mut index = self
            .ids
            .iter()
            .position(|id| *id == tx_id)
            .ok_or(MerkleError::NotFound(tx_id))?;

        let leaf_hash = self.levels[0][index];
        let mut path = Vec::with_capacity(self.levels.len() - 1);

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling, side) = if index % 2 == 0 {
                // Odd-width level: the last node pairs with itself.
                (*level.get(index + 1).unwrap_or(&level[index]), ProofSide::Right)
            } else {
                (level[index - 1], ProofSide::Left)
            };
            path.push(ProofNode { hash: sibling, side });
            index /= 2;
        }

        Ok(MerkleProof {
            tx_id,
            leaf_hash,
            path,
        })
    }
}
