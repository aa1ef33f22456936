pub mod block;
pub mod error;
pub mod ledger;
pub mod params;
pub mod pow;
pub mod store;
pub mod validator;

pub use block::{Block, GENESIS_PREV_HASH};
pub use error::{BlockchainError, InvalidBlockReason};
pub use ledger::{Ledger, TransactionRecord};
pub use params::ChainParams;
pub use validator::{validate_block, validate_chain, ChainState, StateDelta, ValidatedChain};

/// Default minimum difficulty in leading zero bits (four hex zeros).
pub const DEFAULT_DIFFICULTY: u32 = 16;

/// Default coinbase reward per mined block.
pub const DEFAULT_BLOCK_REWARD: u64 = 50;
