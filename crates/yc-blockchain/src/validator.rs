use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    block::{Block, GENESIS_PREV_HASH},
    error::{BlockchainError, InvalidBlockReason},
    ChainParams,
};

/// Balances and spent transaction ids obtained by replaying a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    balances: HashMap<String, u64>,
    seen_ids: HashSet<Uuid>,
    minted: u64,
}

/// Changes a single valid block makes to a [`ChainState`].
///
/// Holds the post-block balance of every touched address, so applying it is
/// a plain overwrite.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    balances: HashMap<String, u64>,
    ids: Vec<Uuid>,
    minted: u64,
}

impl ChainState {
    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen_ids.contains(id)
    }

    /// Total value created by coinbase transactions so far.
    pub fn minted(&self) -> u64 {
        self.minted
    }

    pub fn balances(&self) -> &HashMap<String, u64> {
        &self.balances
    }

    pub fn apply(&mut self, delta: StateDelta) {
        self.balances.extend(delta.balances);
        self.seen_ids.extend(delta.ids);
        self.minted += delta.minted;
    }
}

/// A chain that passed [`validate_chain`], together with its replayed state.
///
/// Only this module can construct one, so holding a `ValidatedChain` proves
/// the blocks were checked.
#[derive(Debug, Clone)]
pub struct ValidatedChain {
    pub(crate) blocks: Vec<Block>,
    pub(crate) state: ChainState,
}

impl ValidatedChain {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis_hash(&self) -> [u8; 32] {
        self.blocks[0].hash()
    }
}

/// Check `block` as the successor of `prev` given the state after `prev`.
///
/// Checks run in order: index, linkage, stored hash, difficulty floor,
/// proof-of-work, merkle root, then each transaction (coinbase placement and
/// amount, signature, duplicate id, funds).  The first failure is returned.
pub fn validate_block(
    block: &Block,
    prev: &Block,
    state: &ChainState,
    params: &ChainParams,
) -> Result<StateDelta, BlockchainError> {
    let fail = |reason| BlockchainError::invalid(block.index, reason);

    if block.index != prev.index + 1 {
        return Err(fail(InvalidBlockReason::BadIndex));
    }
    if block.prev_hash != prev.hash() {
        return Err(fail(InvalidBlockReason::BadLinkage));
    }
    if !block.has_consistent_hash() {
        return Err(fail(InvalidBlockReason::BadHash));
    }
    if block.difficulty < params.min_difficulty {
        return Err(fail(InvalidBlockReason::DifficultyTooLow));
    }
    if !block.meets_difficulty() {
        return Err(fail(InvalidBlockReason::BadProofOfWork));
    }
    if !block.has_consistent_merkle_root()? {
        return Err(fail(InvalidBlockReason::BadMerkleRoot));
    }

    let mut delta = StateDelta::default();
    for (position, tx) in block.transactions.iter().enumerate() {
        if tx.is_coinbase() {
            if position != 0 || tx.amount != params.block_reward {
                return Err(fail(InvalidBlockReason::BadCoinbase));
            }
        } else if tx.verify_signature().is_err() {
            return Err(fail(InvalidBlockReason::BadSignature));
        }

        if state.contains(&tx.id) || delta.ids.contains(&tx.id) {
            return Err(fail(InvalidBlockReason::DuplicateTransaction));
        }
        delta.ids.push(tx.id);

        if tx.is_coinbase() {
            // Balances never exceed the supply, so a bounded supply keeps
            // every later sum in range.
            state
                .minted()
                .checked_add(tx.amount)
                .ok_or_else(|| fail(InvalidBlockReason::BalanceOverflow))?;
            delta.minted = tx.amount;
        } else {
            let sender_balance = delta.current(state, &tx.sender);
            let remaining = sender_balance
                .checked_sub(tx.amount)
                .ok_or_else(|| fail(InvalidBlockReason::Overspend))?;
            delta.balances.insert(tx.sender.clone(), remaining);
        }

        let credited = delta
            .current(state, &tx.recipient)
            .checked_add(tx.amount)
            .ok_or_else(|| fail(InvalidBlockReason::BalanceOverflow))?;
        delta.balances.insert(tx.recipient.clone(), credited);
    }

    Ok(delta)
}

impl StateDelta {
    fn current(&self, state: &ChainState, address: &str) -> u64 {
        self.balances
            .get(address)
            .copied()
            .unwrap_or_else(|| state.balance_of(address))
    }
}

/// Check the genesis block and return the state it establishes.
///
/// Genesis is exempt from proof-of-work but must sit at index 0 on the
/// all-zero previous hash, carry a consistent hash and merkle root, and
/// contain only coinbase allocations with distinct ids.
pub fn validate_genesis(genesis: &Block) -> Result<ChainState, BlockchainError> {
    let fail = || BlockchainError::invalid(genesis.index, InvalidBlockReason::BadGenesis);

    if genesis.index != 0 || genesis.prev_hash != GENESIS_PREV_HASH {
        return Err(fail());
    }
    if !genesis.has_consistent_hash() {
        return Err(BlockchainError::invalid(0, InvalidBlockReason::BadHash));
    }
    if !genesis.has_consistent_merkle_root()? {
        return Err(BlockchainError::invalid(0, InvalidBlockReason::BadMerkleRoot));
    }

    let mut state = ChainState::default();
    for tx in &genesis.transactions {
        if !tx.is_coinbase() || !state.seen_ids.insert(tx.id) {
            return Err(fail());
        }
        let balance = state.balances.entry(tx.recipient.clone()).or_insert(0);
        *balance = balance.checked_add(tx.amount).ok_or_else(fail)?;
        state.minted = state.minted.checked_add(tx.amount).ok_or_else(fail)?;
    }

    Ok(state)
}

/// Walk `blocks` from genesis, re-checking every block and replaying every
/// transaction.  Returns the first violation with the offending block index.
pub fn validate_chain(
    blocks: Vec<Block>,
    params: &ChainParams,
) -> Result<ValidatedChain, BlockchainError> {
    let genesis = blocks.first().ok_or(BlockchainError::EmptyChain)?;
    let mut state = validate_genesis(genesis)?;

    for pair in blocks.windows(2) {
        let delta = validate_block(&pair[1], &pair[0], &state, params)?;
        state.apply(delta);
    }

    Ok(ValidatedChain { blocks, state })
}

#[cfg(test)]
mod tests {
    use yc_transaction::{Transaction, Wallet};

    use super::*;
    use crate::test_support::{mine, TEST_DIFFICULTY};

    struct Fixture {
        params: ChainParams,
        alice: Wallet,
        bob: Wallet,
        blocks: Vec<Block>,
    }

    /// genesis (alice: 100) → block 1 (alice → bob 30) → block 2 (bob → alice 10)
    fn fixture() -> Fixture {
        let alice = Wallet::generate();
        let bob = Wallet::generate();
        let params = ChainParams::new(TEST_DIFFICULTY, 0).with_allocation(alice.address(), 100);

        let genesis = Block::genesis(&params.genesis_allocations).unwrap();
        let b1 = mine(&genesis, vec![alice.transfer(bob.address(), 30).unwrap()]);
        let b2 = mine(&b1, vec![bob.transfer(alice.address(), 10).unwrap()]);

        Fixture {
            params,
            alice,
            bob,
            blocks: vec![genesis, b1, b2],
        }
    }

    fn failing_index(blocks: Vec<Block>, params: &ChainParams) -> (u64, InvalidBlockReason) {
        validate_chain(blocks, params)
            .expect_err("chain should be rejected")
            .invalid_block()
            .expect("should be an invalid block error")
    }

    #[test]
    fn genesis_only_chain_is_valid() {
        let params = ChainParams::default();
        let genesis = Block::genesis(&[]).unwrap();
        let chain = validate_chain(vec![genesis], &params).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn valid_chain_replays_balances() {
        let f = fixture();
        let chain = validate_chain(f.blocks, &f.params).unwrap();
        assert_eq!(chain.state.balance_of(&f.alice.address()), 80);
        assert_eq!(chain.state.balance_of(&f.bob.address()), 20);
        assert_eq!(chain.state.minted(), 100);
    }

    #[test]
    fn revalidating_a_valid_chain_succeeds() {
        let f = fixture();
        let once = validate_chain(f.blocks, &f.params).unwrap();
        let twice = validate_chain(once.blocks.clone(), &f.params).unwrap();
        assert_eq!(once.state, twice.state);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(matches!(
            validate_chain(Vec::new(), &ChainParams::default()),
            Err(BlockchainError::EmptyChain)
        ));
    }

    #[test]
    fn mutated_stored_hash_is_reported_at_its_block() {
        for target in 1..3 {
            let f = fixture();
            let mut blocks = f.blocks;
            blocks[target].hash[31] ^= 0x01;
            let (index, reason) = failing_index(blocks, &f.params);
            assert_eq!(index, target as u64);
            assert_eq!(reason, InvalidBlockReason::BadHash);
        }
    }

    #[test]
    fn mutated_prev_hash_is_reported_at_its_block() {
        let f = fixture();
        let mut blocks = f.blocks;
        blocks[2].prev_hash[0] ^= 0xff;
        assert_eq!(
            failing_index(blocks, &f.params),
            (2, InvalidBlockReason::BadLinkage)
        );
    }

    #[test]
    fn mutated_nonce_is_reported_at_its_block() {
        let f = fixture();
        let mut blocks = f.blocks;
        blocks[1].nonce = blocks[1].nonce.wrapping_add(1);
        assert_eq!(
            failing_index(blocks, &f.params),
            (1, InvalidBlockReason::BadHash)
        );
    }

    #[test]
    fn mutated_amount_is_reported_at_its_block() {
        let f = fixture();
        let mut blocks = f.blocks;
        blocks[1].transactions[0].amount = 99;
        assert_eq!(
            failing_index(blocks, &f.params),
            (1, InvalidBlockReason::BadMerkleRoot)
        );
    }

    #[test]
    fn resealed_forgery_still_fails_signature_check() {
        let f = fixture();
        let mut blocks = f.blocks;
        blocks[1].transactions[0].amount = 99;
        blocks[1].merkle_root = yc_merkle::merkle_root(&blocks[1].transactions).unwrap();
        blocks[1] = crate::test_support::solve(blocks[1].clone());
        blocks.truncate(2);
        assert_eq!(
            failing_index(blocks, &f.params),
            (1, InvalidBlockReason::BadSignature)
        );
    }

    #[test]
    fn overspend_is_rejected() {
        let f = fixture();
        let b3 = mine(&f.blocks[2], vec![f.bob.transfer(f.alice.address(), 21).unwrap()]);
        let mut blocks = f.blocks;
        blocks.push(b3);
        assert_eq!(
            failing_index(blocks, &f.params),
            (3, InvalidBlockReason::Overspend)
        );
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let f = fixture();
        let replay = f.blocks[1].transactions[0].clone();
        let b3 = mine(&f.blocks[2], vec![replay]);
        let mut blocks = f.blocks;
        blocks.push(b3);
        assert_eq!(
            failing_index(blocks, &f.params),
            (3, InvalidBlockReason::DuplicateTransaction)
        );
    }

    #[test]
    fn coinbase_must_lead_and_pay_the_reward() {
        let alice = Wallet::generate();
        let params = ChainParams::new(TEST_DIFFICULTY, 50).with_allocation(alice.address(), 10);
        let genesis = Block::genesis(&params.genesis_allocations).unwrap();
        let state = validate_genesis(&genesis).unwrap();

        let good = mine(&genesis, vec![Transaction::coinbase(alice.address(), 50)]);
        assert!(validate_block(&good, &genesis, &state, &params).is_ok());

        let greedy = mine(&genesis, vec![Transaction::coinbase(alice.address(), 51)]);
        let misplaced = mine(
            &genesis,
            vec![
                alice.transfer("bob", 1).unwrap(),
                Transaction::coinbase(alice.address(), 50),
            ],
        );
        for block in [greedy, misplaced] {
            let err = validate_block(&block, &genesis, &state, &params).unwrap_err();
            assert_eq!(err.invalid_block(), Some((1, InvalidBlockReason::BadCoinbase)));
        }
    }

    #[test]
    fn reward_overflowing_supply_is_rejected() {
        let alice = Wallet::generate();
        let bob = Wallet::generate();
        let params = ChainParams::new(TEST_DIFFICULTY, u64::MAX).with_allocation(alice.address(), 1);
        let genesis = Block::genesis(&params.genesis_allocations).unwrap();
        let block = mine(&genesis, vec![Transaction::coinbase(bob.address(), u64::MAX)]);

        assert_eq!(
            failing_index(vec![genesis, block], &params),
            (1, InvalidBlockReason::BalanceOverflow)
        );
    }

    #[test]
    fn low_difficulty_block_is_rejected() {
        let params = ChainParams::new(TEST_DIFFICULTY + 4, 0);
        let genesis = Block::genesis(&[]).unwrap();
        let state = validate_genesis(&genesis).unwrap();
        let block = mine(&genesis, Vec::new());
        let err = validate_block(&block, &genesis, &state, &params).unwrap_err();
        assert_eq!(
            err.invalid_block(),
            Some((1, InvalidBlockReason::DifficultyTooLow))
        );
    }

    #[test]
    fn unsolved_block_fails_proof_of_work() {
        let params = ChainParams::new(TEST_DIFFICULTY, 0);
        let genesis = Block::genesis(&[]).unwrap();
        let state = validate_genesis(&genesis).unwrap();

        // Walk nonces until the hash is consistent but misses the target.
        let mut block = Block::candidate(1, genesis.hash(), Vec::new(), 64).unwrap();
        while block.meets_difficulty() {
            block.nonce += 1;
            block.seal();
        }
        let err = validate_block(&block, &genesis, &state, &params).unwrap_err();
        assert_eq!(
            err.invalid_block(),
            Some((1, InvalidBlockReason::BadProofOfWork))
        );
    }

    #[test]
    fn genesis_with_signed_transfer_is_rejected() {
        let alice = Wallet::generate();
        let mut genesis = Block::genesis(&[]).unwrap();
        genesis.transactions.push(alice.transfer("bob", 1).unwrap());
        genesis.merkle_root = yc_merkle::merkle_root(&genesis.transactions).unwrap();
        genesis.seal();
        assert_eq!(
            validate_genesis(&genesis).unwrap_err().invalid_block(),
            Some((0, InvalidBlockReason::BadGenesis))
        );
    }
}
