use serde::{Deserialize, Serialize};

/// Consensus parameters every node on a chain must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Lowest difficulty (leading zero bits) a mined block may declare.
    pub min_difficulty: u32,

    /// Amount minted by the coinbase transaction of each mined block.
    pub block_reward: u64,

    /// `(address, amount)` pairs credited by the genesis block.
    pub genesis_allocations: Vec<(String, u64)>,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            min_difficulty: crate::DEFAULT_DIFFICULTY,
            block_reward: crate::DEFAULT_BLOCK_REWARD,
            genesis_allocations: Vec::new(),
        }
    }
}

impl ChainParams {
    pub fn new(min_difficulty: u32, block_reward: u64) -> Self {
        Self {
            min_difficulty,
            block_reward,
            genesis_allocations: Vec::new(),
        }
    }

    /// Credit `address` with `amount` in the genesis block.
    pub fn with_allocation(mut self, address: impl Into<String>, amount: u64) -> Self {
        self.genesis_allocations.push((address.into(), amount));
        self
    }
}
