use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use yc_merkle::merkle_root;
use yc_transaction::{Transaction, COINBASE};

use crate::{pow, BlockchainError};

/// Previous-hash value of the genesis block.
pub const GENESIS_PREV_HASH: [u8; 32] = [0u8; 32];

/// A single block in the Yeetcoin chain.
///
/// Transactions execute in the order they appear and are committed through
/// `merkle_root`.  The stored `hash` is derived from the header by
/// [`Block::seal`] and is checked against the contents on validation; it
/// cannot be assigned from outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequential block height (genesis = 0).
    pub index: u64,

    /// Unix timestamp (seconds) when this block was assembled.
    pub timestamp: i64,

    /// Transfers bundled in this block, in execution order.
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block.  All-zero for the genesis block.
    pub prev_hash: [u8; 32],

    /// Merkle root of `transactions`.
    pub merkle_root: [u8; 32],

    /// Proof-of-work search variable.
    pub nonce: u64,

    /// Leading zero bits the hash had to reach when this block was mined.
    pub difficulty: u32,

    pub(crate) hash: [u8; 32],
}

impl Block {
    /// Build an unsolved block on top of `prev_hash` with nonce 0.
    pub fn candidate(
        index: u64,
        prev_hash: [u8; 32],
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Result<Self, BlockchainError> {
        let merkle_root = merkle_root(&transactions)?;
        let mut block = Self {
            index,
            timestamp: Utc::now().timestamp(),
            transactions,
            prev_hash,
            merkle_root,
            nonce: 0,
            difficulty,
            hash: [0u8; 32],
        };
        block.seal();
        Ok(block)
    }

    /// Create the genesis block crediting each `(address, amount)` pair.
    ///
    /// Allocation ids and the timestamp are fixed so every node derives the
    /// same genesis hash from the same allocations.
    pub fn genesis(allocations: &[(String, u64)]) -> Result<Self, BlockchainError> {
        let transactions: Vec<Transaction> = allocations
            .iter()
            .enumerate()
            .map(|(position, (address, amount))| Transaction {
                id: Uuid::from_u128(position as u128 + 1),
                sender: COINBASE.to_string(),
                recipient: address.clone(),
                amount: *amount,
                timestamp: 0,
                signature: Vec::new(),
            })
            .collect();

        let mut block = Self {
            index: 0,
            timestamp: 0,
            merkle_root: merkle_root(&transactions)?,
            transactions,
            prev_hash: GENESIS_PREV_HASH,
            nonce: 0,
            difficulty: 0,
            hash: [0u8; 32],
        };
        block.seal();
        Ok(block)
    }

    /// Canonical header encoding in fixed field order: index, timestamp,
    /// merkle root, previous hash, nonce, difficulty.  Integers are
    /// little-endian.
    pub fn encode_header(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 32 + 32 + 8 + 4);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.prev_hash);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty.to_le_bytes());
        bytes
    }

    /// SHA-256 of [`Block::encode_header`], recomputed from the current fields.
    pub fn compute_hash(&self) -> [u8; 32] {
        Sha256::digest(self.encode_header()).into()
    }

    /// Recompute and store the hash.  Returns the new hash.
    pub fn seal(&mut self) -> [u8; 32] {
        self.hash = self.compute_hash();
        self.hash
    }

    /// The stored block hash.
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    /// Hex-encoded block hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn prev_hash_hex(&self) -> String {
        hex::encode(self.prev_hash)
    }

    /// True when the stored hash matches the block contents.
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// True when the stored hash satisfies the declared difficulty.
    pub fn meets_difficulty(&self) -> bool {
        pow::meets_difficulty(&self.hash, self.difficulty)
    }

    /// True when the stored merkle root commits to `transactions`.
    pub fn has_consistent_merkle_root(&self) -> Result<bool, BlockchainError> {
        Ok(merkle_root(&self.transactions)? == self.merkle_root)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
