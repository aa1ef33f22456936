use serde::{Deserialize, Serialize};
use yc_blockchain::{Block, TransactionRecord};

/// Plain-data rendering of a block for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    pub index: u64,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: i64,
    pub nonce: u64,
    pub difficulty: u32,
    pub transactions: Vec<TransactionRecord>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: block.hash_hex(),
            prev_hash: block.prev_hash_hex(),
            timestamp: block.timestamp,
            nonce: block.nonce,
            difficulty: block.difficulty,
            transactions: block
                .transactions
                .iter()
                .map(|tx| TransactionRecord::new(tx, block.index))
                .collect(),
        }
    }
}
