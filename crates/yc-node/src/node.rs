use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use yc_blockchain::{store, validate_chain, Block, Ledger, TransactionRecord};
use yc_transaction::{Transaction, Wallet};

use crate::{
    config::NodeConfig,
    error::NodeError,
    event::NodeEvent,
    miner::{Miner, MinerState},
    pool::TransactionPool,
    view::BlockView,
};

/// A single-node Yeetcoin instance.
///
/// Owns the ledger, the transaction pool and the miner, and exposes the call
/// surface a presentation layer drives:
/// - Balance and history queries
/// - Sending from the node's wallet, or submitting pre-signed transactions
/// - A structured view of the chain
/// - Switching mining on and off
/// - Offering an alternative chain (longest chain wins)
///
/// Queries take a read lock on the ledger and never wait for a running
/// proof-of-work search.
pub struct Node {
    config: NodeConfig,
    wallet: Wallet,
    ledger: Arc<RwLock<Ledger>>,
    pool: Arc<Mutex<TransactionPool>>,
    miner: Miner,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

impl Node {
    /// Create a node on a fresh genesis chain built from `config.chain`.
    ///
    /// Returns the node together with a receiver for [`NodeEvent`]s that the
    /// calling application can process independently.
    pub fn new(
        config: NodeConfig,
        wallet: Wallet,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let ledger = Ledger::new(config.chain.clone())?;
        Ok(Self::with_ledger(config, wallet, ledger))
    }

    /// Create a node around an existing ledger.
    pub fn with_ledger(
        config: NodeConfig,
        wallet: Wallet,
        ledger: Ledger,
    ) -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let ledger = Arc::new(RwLock::new(ledger));
        let pool = Arc::new(Mutex::new(TransactionPool::new()));
        let miner = Miner::new(
            ledger.clone(),
            pool.clone(),
            event_tx.clone(),
            wallet.address(),
            config.max_block_transactions,
        );

        let node = Self {
            config,
            wallet,
            ledger,
            pool,
            miner,
            event_tx,
        };
        (node, event_rx)
    }

    /// Restore the node from `config.data_dir`.
    ///
    /// The chain is validated in full; a missing or empty chain file starts a
    /// new genesis chain.  A missing wallet is generated and saved straight
    /// away so the address stays stable across restarts.
    pub fn load_or_generate(
        config: NodeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let key_path = config.key_path();
        let (wallet, generated) = Wallet::load_or_generate(&key_path)?;
        if generated {
            wallet.save(&key_path)?;
            info!(address = %wallet.address(), "Wallet was not found or was empty, a new one was generated");
        } else {
            info!(address = %wallet.address(), "Wallet loaded");
        }

        let chain_path = config.chain_path();
        let ledger = match store::load_chain(&chain_path)? {
            Some(blocks) => {
                let ledger = Ledger::from_blocks(config.chain.clone(), blocks)?;
                info!(length = ledger.len(), "Blockchain loaded");
                ledger
            }
            None => {
                info!("Blockchain was not found or was empty, a new one was generated");
                Ledger::new(config.chain.clone())?
            }
        };

        Ok(Self::with_ledger(config, wallet, ledger))
    }

    /// Write the chain and the wallet key into `config.data_dir`.
    pub fn save(&self) -> Result<(), NodeError> {
        let blocks = self.ledger.read().blocks().to_vec();
        store::save_chain(&self.config.chain_path(), &blocks)?;
        self.wallet.save(&self.config.key_path())?;
        info!(blocks = blocks.len(), dir = %self.config.data_dir.display(), "Node state saved");
        Ok(())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Address of the node's own wallet.
    pub fn address(&self) -> String {
        self.wallet.address()
    }

    /// Balance of the node's own wallet.
    pub fn balance(&self) -> u64 {
        self.get_balance(&self.wallet.address())
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.ledger.read().balance_of(address)
    }

    pub fn chain_length(&self) -> usize {
        self.ledger.read().len()
    }

    pub fn tip_hash(&self) -> String {
        self.ledger.read().tip().hash_hex()
    }

    /// Sign a transfer from the node's wallet and queue it for mining.
    pub fn send_transaction(&self, recipient: &str, amount: u64) -> Result<Uuid, NodeError> {
        let tx = self.wallet.transfer(recipient, amount)?;
        self.submit_transaction(tx)
    }

    /// Queue an externally signed transaction.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Uuid, NodeError> {
        let ledger = self.ledger.read();
        let result = self.pool.lock().submit(tx, &ledger);
        drop(ledger);

        match result {
            Ok(id) => {
                info!(%id, "Transaction accepted");
                self.emit(NodeEvent::TransactionAccepted(id));
                Ok(id)
            }
            Err(e) => {
                warn!("Transaction rejected: {e}");
                self.emit(NodeEvent::Log(format!("transaction rejected: {e}")));
                Err(e.into())
            }
        }
    }

    /// Pending pool contents in mining order.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pool.lock().pending()
    }

    /// Confirmed history, oldest first, optionally limited to one address.
    pub fn get_history(&self, address: Option<&str>) -> Vec<TransactionRecord> {
        self.ledger.read().history(address)
    }

    /// Every block, genesis first, as plain data.
    pub fn get_chain(&self) -> Vec<BlockView> {
        self.ledger.read().blocks().iter().map(BlockView::from).collect()
    }

    /// Raw blocks, e.g. to hand to another node's [`Node::replace_chain`].
    pub fn blocks(&self) -> Vec<Block> {
        self.ledger.read().blocks().to_vec()
    }

    /// Start or stop the miner.  Switching to the current state is a no-op.
    /// Stopping waits until the worker is idle again.
    pub async fn set_mining(&mut self, enabled: bool) -> Result<(), NodeError> {
        if enabled {
            if !self.miner.is_running() {
                self.miner.start(self.config.difficulty)?;
            }
        } else {
            self.miner.stop().await;
        }
        Ok(())
    }

    pub fn is_mining(&self) -> bool {
        self.miner.is_running()
    }

    pub fn miner_state(&self) -> MinerState {
        self.miner.state()
    }

    /// Offer an alternative chain.  It replaces the local chain only if it
    /// shares the local genesis, is strictly longer and validates in full.
    ///
    /// Validation runs without holding the ledger lock; the swap itself is a
    /// single write so readers see either the old or the new chain.  A
    /// running miner notices the new tip and re-bases.
    pub fn replace_chain(&self, blocks: Vec<Block>) -> Result<(), NodeError> {
        let params = {
            let ledger = self.ledger.read();
            ledger.check_fork_choice(&blocks)?;
            ledger.params().clone()
        };
        let validated = validate_chain(blocks, &params)?;

        let new_length = {
            let mut ledger = self.ledger.write();
            ledger.adopt(validated)?;
            let dropped = self.pool.lock().revalidate(&ledger);
            if !dropped.is_empty() {
                info!(dropped = dropped.len(), "Dropped pooled transactions after chain replacement");
            }
            ledger.len()
        };

        self.emit(NodeEvent::ChainReplaced { new_length });
        self.emit(NodeEvent::Log(format!("adopted longer chain of {new_length} blocks")));
        Ok(())
    }

    fn emit(&self, event: NodeEvent) {
        let _ = self.event_tx.send(event);
    }
}
