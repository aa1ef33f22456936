//! Proof-of-work miner.
//!
//! A [`Miner`] runs at most one background worker.  The worker repeatedly
//! drains the pool, builds a candidate on the current tip, searches nonces
//! from 0 upward and appends the solved block.  Both cancellation and the
//! ledger tip are polled every [`CANCEL_CHECK_INTERVAL`] hashes, so `stop`
//! takes effect within that many iterations and a tip moved underneath the
//! search (by a chain replacement) triggers a re-base instead of a stale
//! append.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::{Mutex, RwLock};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;
use yc_blockchain::{
    pow::{self, MAX_DIFFICULTY},
    Block, Ledger,
};
use yc_transaction::Transaction;

use crate::{error::NodeError, event::NodeEvent, pool::TransactionPool};

/// Hash iterations between two checks of the cancellation flag and the tip.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Observable miner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinerState {
    #[default]
    Idle,
    Searching,
    Found,
    Cancelled,
}

/// Result of a nonce search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The block now carries a nonce and hash meeting its difficulty.
    Found(Block),
    /// The cancellation flag was raised after `attempts` hashes.
    Cancelled { attempts: u64 },
    /// The tip moved; the candidate's parent is stale.
    StaleTip,
    /// Every nonce was tried without success.
    Exhausted,
}

/// Search nonces `0..=u64::MAX` for `candidate` at its declared difficulty.
///
/// `cancel` and `tip_changed` are consulted before the first hash and then
/// every [`CANCEL_CHECK_INTERVAL`] hashes.
pub fn search(
    mut candidate: Block,
    cancel: &AtomicBool,
    mut tip_changed: impl FnMut() -> bool,
) -> SearchOutcome {
    let mut nonce: u64 = 0;
    loop {
        if nonce % CANCEL_CHECK_INTERVAL == 0 {
            if cancel.load(Ordering::Relaxed) {
                return SearchOutcome::Cancelled { attempts: nonce };
            }
            if tip_changed() {
                return SearchOutcome::StaleTip;
            }
        }

        candidate.nonce = nonce;
        if pow::meets_difficulty(&candidate.seal(), candidate.difficulty) {
            return SearchOutcome::Found(candidate);
        }

        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => return SearchOutcome::Exhausted,
        };
    }
}

/// Everything the worker thread shares with the node.
#[derive(Clone)]
struct Shared {
    ledger: Arc<RwLock<Ledger>>,
    pool: Arc<Mutex<TransactionPool>>,
    events: mpsc::UnboundedSender<NodeEvent>,
    state: Arc<Mutex<MinerState>>,
    cancel: Arc<AtomicBool>,
}

impl Shared {
    fn set_state(&self, state: MinerState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: NodeEvent) {
        let _ = self.events.send(event);
    }
}

/// Parameters of one mining session.
#[derive(Debug, Clone)]
struct Session {
    difficulty: u32,
    reward_address: String,
    max_block_transactions: usize,
}

/// Outcome of mining one block.
enum Round {
    Mined,
    Cancelled,
}

/// Handle on the background mining worker.
pub struct Miner {
    shared: Shared,
    reward_address: String,
    max_block_transactions: usize,
    worker: Option<JoinHandle<()>>,
}

impl Miner {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        pool: Arc<Mutex<TransactionPool>>,
        events: mpsc::UnboundedSender<NodeEvent>,
        reward_address: String,
        max_block_transactions: usize,
    ) -> Self {
        Self {
            shared: Shared {
                ledger,
                pool,
                events,
                state: Arc::new(Mutex::new(MinerState::Idle)),
                cancel: Arc::new(AtomicBool::new(false)),
            },
            reward_address,
            max_block_transactions,
            worker: None,
        }
    }

    pub fn state(&self) -> MinerState {
        *self.shared.state.lock()
    }

    /// True while a worker is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Start mining at `difficulty` on a blocking worker.  Must be called
    /// from within a Tokio runtime.
    pub fn start(&mut self, difficulty: u32) -> Result<(), NodeError> {
        if self.is_running() {
            return Err(NodeError::MinerBusy);
        }
        let minimum = self.shared.ledger.read().params().min_difficulty;
        if difficulty < minimum {
            return Err(NodeError::DifficultyTooLow {
                requested: difficulty,
                minimum,
            });
        }
        if difficulty > MAX_DIFFICULTY {
            return Err(NodeError::DifficultyTooHigh {
                requested: difficulty,
                maximum: MAX_DIFFICULTY,
            });
        }

        self.shared.cancel.store(false, Ordering::Relaxed);
        self.shared.set_state(MinerState::Searching);
        self.shared.emit(NodeEvent::MiningStateChanged(true));
        info!(difficulty, "Mining started");

        let shared = self.shared.clone();
        let session = Session {
            difficulty,
            reward_address: self.reward_address.clone(),
            max_block_transactions: self.max_block_transactions,
        };
        self.worker = Some(tokio::task::spawn_blocking(move || {
            run_session(&shared, &session)
        }));
        Ok(())
    }

    /// Raise the cancellation flag without waiting for the worker.
    pub fn request_stop(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    /// Cancel the search and wait until the worker is back to idle.
    /// In-flight transactions the tip can still carry return to the pool;
    /// no block is appended, even one found after the request.
    pub async fn stop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Mining worker ended abnormally: {e}");
                self.shared.set_state(MinerState::Idle);
            }
        }
    }
}

fn run_session(shared: &Shared, session: &Session) {
    loop {
        if shared.cancel.load(Ordering::Relaxed) {
            break;
        }
        let txs = shared
            .pool
            .lock()
            .drain_for_block(session.max_block_transactions);

        match mine_round(shared, session, txs) {
            Round::Mined => shared.set_state(MinerState::Searching),
            Round::Cancelled => break,
        }
    }

    shared.set_state(MinerState::Cancelled);
    info!("Mining stopped");
    shared.set_state(MinerState::Idle);
    shared.emit(NodeEvent::MiningStateChanged(false));
}

/// Build a candidate from the coinbase reward and `txs` on the current tip.
fn build_candidate(
    ledger: &Ledger,
    session: &Session,
    txs: &[Transaction],
) -> Result<Block, NodeError> {
    let reward = ledger.params().block_reward;
    let mut body = Vec::with_capacity(txs.len() + 1);
    if reward > 0 {
        body.push(Transaction::coinbase(session.reward_address.clone(), reward));
    }
    body.extend_from_slice(txs);

    let tip = ledger.tip();
    Ok(Block::candidate(
        tip.index + 1,
        tip.hash(),
        body,
        session.difficulty,
    )?)
}

/// Return what survives of `txs` on the current tip to the pool after a
/// cancelled search.
fn abandon(ledger: &Ledger, pool: &Mutex<TransactionPool>, txs: Vec<Transaction>) -> Round {
    let kept = rebase(ledger, pool, txs);
    pool.lock().requeue(kept);
    Round::Cancelled
}

/// Keep the transactions of `txs` that can still go on top of `ledger`,
/// releasing the rest from the pool's in-flight set.
fn rebase(ledger: &Ledger, pool: &Mutex<TransactionPool>, txs: Vec<Transaction>) -> Vec<Transaction> {
    let mut spent: Vec<(String, u64)> = Vec::new();
    let mut kept = Vec::with_capacity(txs.len());
    let mut released: Vec<Uuid> = Vec::new();

    for tx in txs {
        let already_spent = spent
            .iter()
            .filter(|(sender, _)| *sender == tx.sender)
            .map(|(_, amount)| *amount)
            .sum::<u64>();
        let fundable = ledger
            .balance_of(&tx.sender)
            .checked_sub(already_spent)
            .is_some_and(|left| left >= tx.amount);

        if ledger.contains_transaction(&tx.id) || !fundable {
            released.push(tx.id);
        } else {
            spent.push((tx.sender.clone(), tx.amount));
            kept.push(tx);
        }
    }

    if !released.is_empty() {
        debug!(released = released.len(), "Re-base dropped transactions");
        pool.lock().commit(&released);
    }
    kept
}

fn mine_round(shared: &Shared, session: &Session, mut txs: Vec<Transaction>) -> Round {
    loop {
        let (candidate, parent) = {
            let ledger = shared.ledger.read();
            match build_candidate(&ledger, session, &txs) {
                Ok(candidate) => (candidate, ledger.tip_hash()),
                Err(e) => {
                    warn!("Could not build candidate block: {e}");
                    let ids: Vec<Uuid> = txs.iter().map(|tx| tx.id).collect();
                    shared.pool.lock().commit(&ids);
                    shared.emit(NodeEvent::Log(format!("dropped unencodable transactions: {e}")));
                    txs = Vec::new();
                    continue;
                }
            }
        };
        debug!(index = candidate.index, transactions = candidate.transactions.len(), "Searching");

        let outcome = search(candidate, &shared.cancel, || {
            shared.ledger.read().tip_hash() != parent
        });

        match outcome {
            SearchOutcome::Found(block) => {
                shared.set_state(MinerState::Found);
                let mut ledger = shared.ledger.write();
                // A stop requested between the last check and now wins.
                if shared.cancel.load(Ordering::Relaxed) {
                    debug!(index = block.index, "Discarding block found after stop");
                    return abandon(&ledger, &shared.pool, txs);
                }
                if ledger.tip_hash() != parent {
                    txs = rebase(&ledger, &shared.pool, txs);
                    continue;
                }

                let index = block.index;
                let hash = block.hash_hex();
                let count = block.transactions.len();
                let ids: Vec<Uuid> = txs.iter().map(|tx| tx.id).collect();

                match ledger.append(block) {
                    Ok(()) => {
                        shared.pool.lock().commit(&ids);
                        drop(ledger);
                        info!(index, %hash, transactions = count, "Mined block");
                        shared.emit(NodeEvent::Log(format!("mined block #{index} {hash}")));
                        shared.emit(NodeEvent::BlockMined {
                            index,
                            hash,
                            transactions: count,
                        });
                        return Round::Mined;
                    }
                    Err(e) => {
                        // Same parent yet refused: something in `txs` no
                        // longer fits, so drop what the tip cannot carry.
                        warn!(index, "Mined block rejected: {e}");
                        txs = rebase(&ledger, &shared.pool, txs);
                        continue;
                    }
                }
            }
            SearchOutcome::StaleTip => {
                debug!("Tip moved during search, re-basing");
                let ledger = shared.ledger.read();
                txs = rebase(&ledger, &shared.pool, txs);
            }
            SearchOutcome::Exhausted => {
                debug!("Nonce space exhausted, refreshing candidate timestamp");
            }
            SearchOutcome::Cancelled { attempts } => {
                debug!(attempts, "Search cancelled");
                let ledger = shared.ledger.read();
                return abandon(&ledger, &shared.pool, txs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use yc_blockchain::{ChainParams, Ledger};

    use super::*;

    fn candidate_on_genesis(difficulty: u32) -> Block {
        let genesis = Block::genesis(&[]).unwrap();
        Block::candidate(1, genesis.hash(), Vec::new(), difficulty).unwrap()
    }

    #[test]
    fn search_finds_block_meeting_difficulty() {
        let cancel = AtomicBool::new(false);
        match search(candidate_on_genesis(16), &cancel, || false) {
            SearchOutcome::Found(block) => {
                assert!(block.hash_hex().starts_with("0000"));
                assert!(block.has_consistent_hash());
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn raised_flag_stops_before_hashing() {
        let cancel = AtomicBool::new(true);
        assert_eq!(
            search(candidate_on_genesis(255), &cancel, || false),
            SearchOutcome::Cancelled { attempts: 0 }
        );
    }

    #[test]
    fn cancellation_is_observed_within_one_interval() {
        let cancel = AtomicBool::new(false);
        let checks = Cell::new(0);
        // Raise the flag during the first check; it must be seen at the next.
        let outcome = search(candidate_on_genesis(255), &cancel, || {
            checks.set(checks.get() + 1);
            cancel.store(true, Ordering::Relaxed);
            false
        });
        assert_eq!(
            outcome,
            SearchOutcome::Cancelled {
                attempts: CANCEL_CHECK_INTERVAL
            }
        );
        assert_eq!(checks.get(), 1);
    }

    #[test]
    fn moved_tip_abandons_the_search() {
        let cancel = AtomicBool::new(false);
        assert_eq!(
            search(candidate_on_genesis(255), &cancel, || true),
            SearchOutcome::StaleTip
        );
    }

    #[tokio::test]
    async fn block_found_after_stop_request_is_not_appended() {
        for _ in 0..20 {
            let ledger = Arc::new(RwLock::new(Ledger::new(ChainParams::new(8, 50)).unwrap()));
            let pool = Arc::new(Mutex::new(TransactionPool::new()));
            let (events, _rx) = mpsc::unbounded_channel();
            let mut miner = Miner::new(ledger.clone(), pool, events, "miner".into(), 16);

            miner.start(8).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;

            // Hold the writer lock so the worker cannot append while the
            // stop is requested.
            let length = {
                let guard = ledger.write();
                miner.request_stop();
                guard.len()
            };
            miner.stop().await;

            assert_eq!(ledger.read().len(), length);
            assert_eq!(miner.state(), MinerState::Idle);
        }
    }

    #[test]
    fn rebase_keeps_only_what_the_tip_can_fund() {
        let alice = yc_transaction::Wallet::generate();
        let ledger = Ledger::new(ChainParams::new(8, 0).with_allocation(alice.address(), 50)).unwrap();
        let pool = Mutex::new(TransactionPool::new());

        let first = alice.transfer("bob", 30).unwrap();
        let second = alice.transfer("bob", 30).unwrap();
        {
            let mut guard = pool.lock();
            guard.submit(first.clone(), &ledger).unwrap();
            // Bypass the pool's own funds check to simulate a chain swap.
            guard.requeue(vec![second.clone()]);
            guard.drain_for_block(2);
        }

        let kept = rebase(&ledger, &pool, vec![first.clone(), second]);
        assert_eq!(kept, vec![first]);
        assert_eq!(pool.lock().in_flight_len(), 1);
    }
}
