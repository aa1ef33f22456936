use std::path::{Path, PathBuf};

use yc_blockchain::{ChainParams, DEFAULT_DIFFICULTY};

/// File name of the persisted chain inside the data directory.
pub const CHAIN_FILE: &str = "blockchain.json";

/// File name of the wallet secret inside the data directory.
pub const KEY_FILE: &str = "key.hex";

/// Full configuration for a [`crate::Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding the chain and wallet files.  Defaults to `data`.
    pub data_dir: PathBuf,

    /// Consensus parameters; used to build genesis and validate blocks.
    pub chain: ChainParams,

    /// Difficulty (leading zero bits) the miner searches at.  Must not be
    /// below `chain.min_difficulty`.
    pub difficulty: u32,

    /// Most pool transactions packed into one block, besides the coinbase.
    pub max_block_transactions: usize,

    /// When `true` the binary switches mining on right after start-up.
    pub mine_on_start: bool,

    /// When `true` the binary embedding this node should suppress log output.
    /// The library never installs a tracing subscriber itself.
    pub quiet: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            chain: ChainParams::default(),
            difficulty: DEFAULT_DIFFICULTY,
            max_block_transactions: 16,
            mine_on_start: false,
            quiet: false,
        }
    }
}

impl NodeConfig {
    /// Default config storing its files under `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Mine and validate at `difficulty`.
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self.chain.min_difficulty = difficulty;
        self
    }

    pub fn with_chain(mut self, chain: ChainParams) -> Self {
        self.chain = chain;
        self
    }

    pub fn chain_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join(KEY_FILE)
    }
}
