use uuid::Uuid;

/// Notifications pushed from a running [`crate::Node`] to whoever drives it
/// (a UI, the daemon's logger).  Delivery is fire-and-forget: the node never
/// waits for, or fails because of, a missing receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Human-readable status line.
    Log(String),

    /// The miner was switched on (`true`) or has come to rest (`false`).
    MiningStateChanged(bool),

    /// A transaction entered the pool.
    TransactionAccepted(Uuid),

    /// The local miner appended a block.
    BlockMined {
        index: u64,
        hash: String,
        transactions: usize,
    },

    /// The local chain was replaced by a longer valid chain.
    ChainReplaced { new_length: usize },
}
