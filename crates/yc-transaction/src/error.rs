use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
