pub mod error;
pub mod transaction;
pub mod wallet;

pub use error::TransactionError;
pub use transaction::{verifying_key_from_address, Transaction, COINBASE};
pub use wallet::Wallet;
