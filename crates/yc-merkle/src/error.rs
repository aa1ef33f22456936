use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("tree is empty")]
    Empty,

    #[error("transaction {0} not found in tree")]
    NotFound(Uuid),

    #[error("transaction hashing failed: {0}")]
    HashFailed(#[from] yc_transaction::TransactionError),
}
