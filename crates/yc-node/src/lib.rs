pub mod config;
pub mod error;
pub mod event;
pub mod miner;
pub mod node;
pub mod pool;
pub mod view;

pub use config::NodeConfig;
pub use error::{NodeError, PoolError};
pub use event::NodeEvent;
pub use miner::{Miner, MinerState, SearchOutcome};
pub use node::Node;
pub use pool::TransactionPool;
pub use view::BlockView;
