use thiserror::Error;
use uuid::Uuid;

/// Why a block was refused by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidBlockReason {
    #[error("previous hash does not match the parent block")]
    BadLinkage,

    #[error("index is not parent index + 1")]
    BadIndex,

    #[error("stored hash does not match the block contents")]
    BadHash,

    #[error("hash does not satisfy the block difficulty")]
    BadProofOfWork,

    #[error("difficulty is below the chain minimum")]
    DifficultyTooLow,

    #[error("merkle root does not match the transactions")]
    BadMerkleRoot,

    #[error("transaction signature is invalid")]
    BadSignature,

    #[error("sender spends more than its balance")]
    Overspend,

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("transaction id already used")]
    DuplicateTransaction,

    #[error("coinbase transaction is misplaced or pays the wrong reward")]
    BadCoinbase,

    #[error("genesis block is malformed")]
    BadGenesis,
}

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("invalid block #{index}: {reason}")]
    InvalidBlock {
        index: u64,
        reason: InvalidBlockReason,
    },

    #[error("chain mismatch: {0}")]
    ChainMismatch(String),

    #[error("chain is empty")]
    EmptyChain,

    #[error("transaction {0} not found on chain")]
    TransactionNotFound(Uuid),

    #[error("merkle error: {0}")]
    Merkle(#[from] yc_merkle::MerkleError),

    #[error("transaction error: {0}")]
    Transaction(#[from] yc_transaction::TransactionError),

    #[error("chain encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlockchainError {
    pub(crate) fn invalid(index: u64, reason: InvalidBlockReason) -> Self {
        Self::InvalidBlock { index, reason }
    }

    /// The block index and reason when this is an `InvalidBlock` error.
    pub fn invalid_block(&self) -> Option<(u64, InvalidBlockReason)> {
        match self {
            Self::InvalidBlock { index, reason } => Some((*index, *reason)),
            _ => None,
        }
    }
}
