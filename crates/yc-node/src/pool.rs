use std::collections::{HashSet, VecDeque};

use tracing::debug;
use uuid::Uuid;
use yc_blockchain::Ledger;
use yc_transaction::Transaction;

use crate::error::PoolError;

/// Transactions waiting to be mined.
///
/// `pending` is FIFO by arrival.  Transactions handed to the miner by
/// [`TransactionPool::drain_for_block`] move to `in_flight`: they are never
/// drained twice, but still count against their sender's spendable balance
/// until the miner either commits or requeues them.
#[derive(Debug, Default)]
pub struct TransactionPool {
    pending: VecDeque<Transaction>,
    in_flight: Vec<Transaction>,
    /// Ids of everything in `pending` or `in_flight`.
    ids: HashSet<Uuid>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions waiting to be drained.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Snapshot of the pending queue in drain order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.iter().cloned().collect()
    }

    /// Amount `sender` has committed in pending and in-flight transactions.
    pub fn outgoing(&self, sender: &str) -> u64 {
        self.pending
            .iter()
            .chain(&self.in_flight)
            .filter(|tx| tx.sender == sender)
            .fold(0u64, |sum, tx| sum.saturating_add(tx.amount))
    }

    /// Confirmed balance minus everything already committed in the pool.
    pub fn spendable(&self, address: &str, ledger: &Ledger) -> u64 {
        ledger.balance_of(address).saturating_sub(self.outgoing(address))
    }

    /// Validate `tx` and queue it.
    ///
    /// Rejects coinbase, unsigned and mis-signed transactions, ids already
    /// pooled or on chain, and transfers the sender cannot fund once its other
    /// pooled transactions are taken into account.
    pub fn submit(&mut self, tx: Transaction, ledger: &Ledger) -> Result<Uuid, PoolError> {
        tx.verify_signature()
            .map_err(|_| PoolError::InvalidSignature)?;

        if self.ids.contains(&tx.id) || ledger.contains_transaction(&tx.id) {
            return Err(PoolError::DuplicateTransaction(tx.id));
        }

        let available = self.spendable(&tx.sender, ledger);
        if tx.amount > available {
            return Err(PoolError::InsufficientFunds {
                available,
                requested: tx.amount,
            });
        }

        let id = tx.id;
        debug!(%id, amount = tx.amount, "Transaction pooled");
        self.ids.insert(id);
        self.pending.push_back(tx);
        Ok(id)
    }

    /// Hand up to `max_count` transactions, oldest first, to the miner.
    pub fn drain_for_block(&mut self, max_count: usize) -> Vec<Transaction> {
        let count = max_count.min(self.pending.len());
        let drained: Vec<Transaction> = self.pending.drain(..count).collect();
        self.in_flight.extend(drained.iter().cloned());
        drained
    }

    /// Forget in-flight transactions that are now on chain or were discarded
    /// by the miner.
    pub fn commit(&mut self, ids: &[Uuid]) {
        self.in_flight.retain(|tx| !ids.contains(&tx.id));
        for id in ids {
            self.ids.remove(id);
        }
    }

    /// Put in-flight transactions back at the head of the queue, keeping
    /// their original order.
    pub fn requeue(&mut self, txs: Vec<Transaction>) {
        let ids: Vec<Uuid> = txs.iter().map(|tx| tx.id).collect();
        self.in_flight.retain(|tx| !ids.contains(&tx.id));
        for tx in txs.into_iter().rev() {
            self.pending.push_front(tx);
        }
    }

    /// Drop pending transactions that the (possibly replaced) chain already
    /// contains or that their sender can no longer fund.  Returns what was
    /// dropped.
    pub fn revalidate(&mut self, ledger: &Ledger) -> Vec<Transaction> {
        let queued = std::mem::take(&mut self.pending);
        let mut dropped = Vec::new();

        for tx in queued {
            let fundable = tx.amount <= self.spendable(&tx.sender, ledger);
            if ledger.contains_transaction(&tx.id) || !fundable {
                self.ids.remove(&tx.id);
                dropped.push(tx);
            } else {
                self.pending.push_back(tx);
            }
        }

        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "Pool revalidated");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use yc_blockchain::ChainParams;
    use yc_transaction::Wallet;

    use super::*;

    fn ledger_with(wallet: &Wallet, amount: u64) -> Ledger {
        Ledger::new(ChainParams::new(8, 0).with_allocation(wallet.address(), amount)).unwrap()
    }

    #[test]
    fn insufficient_funds_leaves_balance_untouched() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        let err = pool
            .submit(alice.transfer("bob", 150).unwrap(), &ledger)
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientFunds {
                available: 100,
                requested: 150
            }
        );
        assert!(pool.is_empty());
        assert_eq!(ledger.balance_of(&alice.address()), 100);
    }

    #[test]
    fn pooled_spends_count_against_the_sender() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        pool.submit(alice.transfer("bob", 70).unwrap(), &ledger).unwrap();
        let err = pool
            .submit(alice.transfer("carol", 40).unwrap(), &ledger)
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientFunds {
                available: 30,
                requested: 40
            }
        );
        pool.submit(alice.transfer("carol", 30).unwrap(), &ledger).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn unsigned_and_forged_transactions_are_rejected() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        let unsigned = Transaction::new(alice.address(), "bob", 1);
        assert_eq!(pool.submit(unsigned, &ledger), Err(PoolError::InvalidSignature));

        let mut forged = alice.transfer("bob", 1).unwrap();
        forged.recipient = "mallory".into();
        assert_eq!(pool.submit(forged, &ledger), Err(PoolError::InvalidSignature));

        let coinbase = Transaction::coinbase(alice.address(), 1_000);
        assert_eq!(pool.submit(coinbase, &ledger), Err(PoolError::InvalidSignature));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        let tx = alice.transfer("bob", 1).unwrap();
        pool.submit(tx.clone(), &ledger).unwrap();
        assert_eq!(
            pool.submit(tx.clone(), &ledger),
            Err(PoolError::DuplicateTransaction(tx.id))
        );

        // Still a duplicate while in flight.
        pool.drain_for_block(10);
        assert_eq!(
            pool.submit(tx.clone(), &ledger),
            Err(PoolError::DuplicateTransaction(tx.id))
        );
    }

    #[test]
    fn drain_is_fifo_and_exclusive() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        let ids: Vec<Uuid> = (1..=5)
            .map(|i| pool.submit(alice.transfer("bob", i).unwrap(), &ledger).unwrap())
            .collect();

        let first = pool.drain_for_block(3);
        assert_eq!(first.iter().map(|tx| tx.id).collect::<Vec<_>>(), ids[..3].to_vec());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.in_flight_len(), 3);

        let second = pool.drain_for_block(10);
        assert_eq!(second.iter().map(|tx| tx.id).collect::<Vec<_>>(), ids[3..].to_vec());
        assert!(pool.drain_for_block(10).is_empty());

        // In-flight amounts are still reserved: 1+2+3+4+5 = 15 of 100.
        assert_eq!(pool.spendable(&alice.address(), &ledger), 85);
    }

    #[test]
    fn requeue_restores_order_at_the_front() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        for i in 1..=3 {
            pool.submit(alice.transfer("bob", i).unwrap(), &ledger).unwrap();
        }
        let drained = pool.drain_for_block(2);
        let expected: Vec<Uuid> = drained
            .iter()
            .map(|tx| tx.id)
            .chain(pool.pending().iter().map(|tx| tx.id))
            .collect();

        pool.requeue(drained);
        assert_eq!(pool.in_flight_len(), 0);
        assert_eq!(
            pool.pending().iter().map(|tx| tx.id).collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn commit_releases_in_flight_transactions() {
        let alice = Wallet::generate();
        let ledger = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        let id = pool.submit(alice.transfer("bob", 10).unwrap(), &ledger).unwrap();
        pool.drain_for_block(1);
        pool.commit(&[id]);

        assert_eq!(pool.in_flight_len(), 0);
        assert!(!pool.contains(&id));
        assert_eq!(pool.outgoing(&alice.address()), 0);
    }

    #[test]
    fn revalidate_drops_unfundable_transactions() {
        let alice = Wallet::generate();
        let funded = ledger_with(&alice, 100);
        let mut pool = TransactionPool::new();

        pool.submit(alice.transfer("bob", 60).unwrap(), &funded).unwrap();
        pool.submit(alice.transfer("bob", 30).unwrap(), &funded).unwrap();

        // A chain on which alice only has 70.
        let poorer = Ledger::new(
            ChainParams::new(8, 0).with_allocation(alice.address(), 70),
        )
        .unwrap();
        let dropped = pool.revalidate(&poorer);

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].amount, 30);
        assert_eq!(pool.len(), 1);
    }
}
