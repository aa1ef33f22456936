use thiserror::Error;
use uuid::Uuid;

/// Reasons the transaction pool refuses a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(Uuid),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("pool rejected transaction: {0}")]
    Pool(#[from] PoolError),

    #[error("blockchain error: {0}")]
    Blockchain(#[from] yc_blockchain::BlockchainError),

    #[error("transaction error: {0}")]
    Transaction(#[from] yc_transaction::TransactionError),

    #[error("miner is already running")]
    MinerBusy,

    #[error("mining difficulty {requested} is below the chain minimum {minimum}")]
    DifficultyTooLow { requested: u32, minimum: u32 },

    #[error("mining difficulty {requested} exceeds the maximum {maximum}")]
    DifficultyTooHigh { requested: u32, maximum: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
