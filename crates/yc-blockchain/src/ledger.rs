use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use yc_merkle::{MerkleProof, MerkleTree};
use yc_transaction::Transaction;

use crate::{
    block::Block,
    error::BlockchainError,
    validator::{self, ChainState, ValidatedChain},
    ChainParams,
};

/// One transaction as seen in the chain history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub timestamp: i64,
    /// Index of the block that includes this transaction.
    pub block_index: u64,
}

impl TransactionRecord {
    pub fn new(tx: &Transaction, block_index: u64) -> Self {
        Self {
            id: tx.id,
            from: tx.sender.clone(),
            to: tx.recipient.clone(),
            amount: tx.amount,
            timestamp: tx.timestamp,
            block_index,
        }
    }
}

/// The authoritative chain plus the state derived from it.
///
/// Invariants maintained by this type:
/// - Always contains at least the genesis block.
/// - Every block passed the validator against its parent.
/// - `state` equals a full replay of `blocks`.
#[derive(Debug, Clone)]
pub struct Ledger {
    params: ChainParams,
    blocks: Vec<Block>,
    state: ChainState,
}

impl Ledger {
    /// Start a new chain holding only the genesis block built from
    /// `params.genesis_allocations`.
    pub fn new(params: ChainParams) -> Result<Self, BlockchainError> {
        let genesis = Block::genesis(&params.genesis_allocations)?;
        let state = validator::validate_genesis(&genesis)?;
        Ok(Self {
            params,
            blocks: vec![genesis],
            state,
        })
    }

    /// Restore a chain, validating it in full first.
    ///
    /// A restored genesis that differs from the one `params` would build is
    /// accepted but logged.
    pub fn from_blocks(params: ChainParams, blocks: Vec<Block>) -> Result<Self, BlockchainError> {
        let validated = validator::validate_chain(blocks, &params)?;
        info!(length = validated.len(), "Restored chain");
        let ledger = Self {
            params,
            blocks: validated.blocks,
            state: validated.state,
        };
        if !ledger.has_configured_genesis()? {
            warn!(
                genesis = %ledger.blocks[0].hash_hex(),
                "Restored genesis does not match the configured allocations"
            );
        }
        Ok(ledger)
    }

    /// True when the genesis block is the one built from
    /// `params.genesis_allocations`.
    pub fn has_configured_genesis(&self) -> Result<bool, BlockchainError> {
        Ok(Block::genesis(&self.params.genesis_allocations)?.hash() == self.genesis_hash())
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Number of blocks in the chain (including genesis).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The most recent block.
    pub fn tip(&self) -> &Block {
        // Never empty: construction always installs a genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn tip_hash(&self) -> [u8; 32] {
        self.tip().hash()
    }

    pub fn genesis_hash(&self) -> [u8; 32] {
        self.blocks[0].hash()
    }

    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// All blocks from `start_index` onward (inclusive).
    pub fn blocks_from(&self, start_index: u64) -> &[Block] {
        self.blocks.get(start_index as usize..).unwrap_or(&[])
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.state.balance_of(address)
    }

    /// True when a transaction with `id` is already on chain.
    pub fn contains_transaction(&self, id: &Uuid) -> bool {
        self.state.contains(id)
    }

    /// Total value minted by genesis allocations and block rewards.
    pub fn total_supply(&self) -> u64 {
        self.state.minted()
    }

    /// Sum of every cached balance.  Equals [`Ledger::total_supply`] on any
    /// valid chain.
    pub fn total_balances(&self) -> u64 {
        self.state
            .balances()
            .values()
            .fold(0u64, |sum, balance| sum.saturating_add(*balance))
    }

    /// Append `block` after checking it against the current tip.
    ///
    /// All-or-nothing: on error the chain and balances are untouched.
    pub fn append(&mut self, block: Block) -> Result<(), BlockchainError> {
        let delta = validator::validate_block(&block, self.tip(), &self.state, &self.params)?;
        debug!(
            index = block.index,
            hash = %block.hash_hex(),
            transactions = block.transactions.len(),
            "Appending block"
        );
        self.state.apply(delta);
        self.blocks.push(block);
        Ok(())
    }

    /// Chain history, oldest first (block order, then in-block order).
    ///
    /// With `Some(address)` only transactions sent or received by that
    /// address are returned.
    pub fn history(&self, address: Option<&str>) -> Vec<TransactionRecord> {
        self.blocks
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .map(move |tx| TransactionRecord::new(tx, block.index))
            })
            .filter(|record| match address {
                Some(address) => record.from == address || record.to == address,
                None => true,
            })
            .collect()
    }

    /// Inclusion proof for an on-chain transaction, with the index of the
    /// block whose `merkle_root` it verifies against.
    pub fn transaction_proof(&self, id: Uuid) -> Result<(u64, MerkleProof), BlockchainError> {
        let block = self
            .blocks
            .iter()
            .find(|block| block.transactions.iter().any(|tx| tx.id == id))
            .ok_or(BlockchainError::TransactionNotFound(id))?;

        let tree = MerkleTree::new(&block.transactions)?;
        Ok((block.index, tree.proof(id)?))
    }

    /// Reject `candidate` unless it shares our genesis and is strictly
    /// longer.  Cheap checks only; nothing is validated.
    pub fn check_fork_choice(&self, candidate: &[Block]) -> Result<(), BlockchainError> {
        let genesis = candidate.first().ok_or(BlockchainError::EmptyChain)?;
        if genesis.hash() != self.genesis_hash() {
            return Err(BlockchainError::ChainMismatch(
                "candidate has a different genesis block".into(),
            ));
        }
        if candidate.len() <= self.len() {
            return Err(BlockchainError::ChainMismatch(format!(
                "candidate length {} does not exceed current length {}",
                candidate.len(),
                self.len()
            )));
        }
        Ok(())
    }

    /// Swap in a validated chain if the fork-choice rule prefers it.
    ///
    /// Blocks, balances and the id index change in a single assignment.
    pub fn adopt(&mut self, candidate: ValidatedChain) -> Result<(), BlockchainError> {
        self.check_fork_choice(candidate.blocks())?;
        info!(
            old_length = self.len(),
            new_length = candidate.len(),
            "Replacing chain"
        );
        self.blocks = candidate.blocks;
        self.state = candidate.state;
        Ok(())
    }

    /// Longest-chain-wins replacement: `candidate` is adopted only when it
    /// shares our genesis, is strictly longer and validates in full.  Ties
    /// keep the incumbent.  On any error the current chain is untouched.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), BlockchainError> {
        self.check_fork_choice(&candidate)?;
        let validated = validator::validate_chain(candidate, &self.params)?;
        self.adopt(validated)
    }
}
