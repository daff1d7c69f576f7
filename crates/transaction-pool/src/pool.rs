//! The pool itself (§4.3): per-sender pending/queued sets ordered by
//! nonce, a secondary hash index, reorg-aware re-injection, and the
//! promotion/demotion pass that keeps `pending` in sync with the latest
//! `vm` head.
//!
//! Grounded on the teacher's `reth-transaction-pool::pool::TxPool`
//! sub-pool split (`PendingPool`/`QueuedPool`), simplified to this
//! core's in-memory, single-chain model: no parked/basefee sub-pool
//! distinction, since §4.3 only names `pending` and `queued`.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc,
    },
};

use alloy_primitives::{Address, TxHash, B256, U256};
use execution_chainspec::ChainSpec;
use execution_ethereum_forks::Hardfork;
use execution_primitives::SealedBlock;
use parking_lot::RwLock;

use crate::{
    error::{InvalidPoolTransactionError, PoolError, PoolResult},
    ordering::{BestTransactions, BestTransactionsAttributes},
    tx::{PoolTransaction, TransactionOrigin},
};

/// A pooled transaction plus the bookkeeping the pool needs on top of it
/// (§3 "Tx pool entry": `{tx, hash, added, error?}` — `hash` is
/// recoverable from `transaction` itself, `error` lives only transiently
/// in the `Result` an operation returns).
#[derive(Debug)]
pub struct ValidPoolTransaction<T: PoolTransaction> {
    /// The pooled transaction.
    pub transaction: T,
    /// Monotonic insertion timestamp, used to break fee ties in the
    /// price-sorted iterator (§4.3).
    pub added: u64,
    /// Where this transaction came from.
    pub origin: TransactionOrigin,
}

/// What the pool needs to know about a sender's on-chain account as of
/// the current `vm` head, to decide pending-vs-queued placement and to
/// validate balance sufficiency (§4.3).
pub trait PoolAccountReader: Send + Sync + 'static {
    /// `(nonce, balance)` for `sender` as of the latest `vm` head.
    fn account(&self, sender: Address) -> (u64, U256);

    /// `(number, timestamp)` of the current canonical head, used to
    /// decide which hardfork rules currently apply (§4.3 "replay
    /// protection rules ... for the current hardfork").
    fn head(&self) -> (u64, u64);
}

/// Capacity and pricing knobs (§3 "Total memory footprint is bounded").
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Max pooled transactions for a single sender (pending + queued).
    pub max_account_slots: usize,
    /// Max distinct senders tracked at once.
    pub max_accounts: usize,
    /// Max total pooled transactions across every sender.
    pub max_total_slots: usize,
    /// Max total bytes of blob data pooled at once.
    pub max_blob_bytes: u64,
    /// Minimum percentage increase a replacement's priority fee must
    /// clear over the entry it would replace (§4.3 invariant).
    pub price_bump_percent: u128,
    /// Max RLP-encoded length of a single pooled transaction.
    pub max_encoded_length: usize,
    /// Max blobs a single 4844 transaction may carry, mirroring the
    /// per-block cap (§4.3 `add()`).
    pub max_blobs_per_tx: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_account_slots: 64,
            max_accounts: 10_000,
            max_total_slots: 10_000,
            max_blob_bytes: 10 * 1024 * 1024,
            price_bump_percent: 10,
            max_encoded_length: 128 * 1024,
            max_blobs_per_tx: 6,
        }
    }
}

type SenderQueue<T> = BTreeMap<u64, Arc<ValidPoolTransaction<T>>>;

#[derive(Default)]
struct Inner<T: PoolTransaction> {
    pending: HashMap<Address, SenderQueue<T>>,
    queued: HashMap<Address, SenderQueue<T>>,
    by_hash: HashMap<TxHash, Arc<ValidPoolTransaction<T>>>,
    /// Versioned-hash -> tx-hash index for 4844 KZG proofs (§3).
    kzg_proof_index: HashMap<B256, TxHash>,
    /// Versioned-hash -> tx-hash index for 4844 cell proofs (§3, Osaka
    /// PeerDAS).
    cell_proof_index: HashMap<B256, TxHash>,
    blob_bytes: u64,
}

impl<T: PoolTransaction> Inner<T> {
    fn total_len(&self) -> usize {
        self.by_hash.len()
    }

    fn sender_len(&self, sender: Address) -> usize {
        self.pending.get(&sender).map_or(0, BTreeMap::len)
            + self.queued.get(&sender).map_or(0, BTreeMap::len)
    }
}

/// The transaction pool (§4.3): accepts transactions, organizes them
/// per-sender by nonce, and exposes the price-sorted view the block
/// builder pulls from.
pub struct TxPool<T: PoolTransaction, A: PoolAccountReader> {
    chain_spec: Arc<ChainSpec>,
    account_reader: Arc<A>,
    config: PoolConfig,
    inner: RwLock<Inner<T>>,
    clock: AtomicU64,
}

impl<T: PoolTransaction, A: PoolAccountReader> TxPool<T, A> {
    /// Creates an empty pool validating against `chain_spec` and reading
    /// account state through `account_reader`.
    pub fn new(chain_spec: Arc<ChainSpec>, account_reader: Arc<A>, config: PoolConfig) -> Self {
        Self {
            chain_spec,
            account_reader,
            config,
            inner: RwLock::new(Inner::default()),
            clock: AtomicU64::new(0),
        }
    }

    fn next_added(&self) -> u64 {
        self.clock.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// `add(tx, isLocal)` (§4.3): validates the transaction and places it
    /// into `pending` (if its nonce is immediately executable) or
    /// `queued` (if a gap remains above the sender's current nonce).
    pub fn add(&self, transaction: T, origin: TransactionOrigin) -> PoolResult<TxHash> {
        let hash = transaction.hash();
        {
            let inner = self.inner.read();
            if inner.by_hash.contains_key(&hash) {
                return Err(PoolError::AlreadyKnown(hash));
            }
        }

        self.validate(&transaction, origin)?;

        let sender = transaction.sender();
        let (account_nonce, balance) = self.account_reader.account(sender);
        if transaction.nonce() < account_nonce {
            return Err(InvalidPoolTransactionError::NonceTooLow {
                tx_nonce: transaction.nonce(),
                account_nonce,
            }
            .into());
        }
        if transaction.cost() > balance {
            return Err(InvalidPoolTransactionError::InsufficientBalance {
                balance,
                cost: transaction.cost(),
            }
            .into());
        }

        let mut inner = self.inner.write();

        if inner.sender_len(sender) >= self.config.max_account_slots
            && !inner.pending.get(&sender).map_or(false, |p| p.contains_key(&transaction.nonce()))
            && !inner.queued.get(&sender).map_or(false, |q| q.contains_key(&transaction.nonce()))
        {
            return Err(PoolError::PoolOverflow);
        }

        self.replace_or_insert(&mut inner, sender, transaction, origin, account_nonce)?;
        drop(inner);

        self.promote_executables();
        Ok(hash)
    }

    fn validate(&self, transaction: &T, origin: TransactionOrigin) -> PoolResult<()> {
        if let Some(tx_chain_id) = transaction.chain_id() {
            let expected = self.chain_spec.chain.id();
            if tx_chain_id != expected {
                return Err(InvalidPoolTransactionError::ChainIdMismatch {
                    expected,
                    got: Some(tx_chain_id),
                }
                .into());
            }
        }
        if transaction.encoded_length() > self.config.max_encoded_length {
            return Err(InvalidPoolTransactionError::Oversized {
                size: transaction.encoded_length(),
                max: self.config.max_encoded_length,
            }
            .into());
        }
        if transaction.blob_count() > self.config.max_blobs_per_tx {
            return Err(InvalidPoolTransactionError::BlobCountExceeded {
                count: transaction.blob_count(),
                max: self.config.max_blobs_per_tx,
            }
            .into());
        }

        let required = transaction.intrinsic_gas();
        if transaction.gas_limit() < required {
            return Err(InvalidPoolTransactionError::IntrinsicGasExceeded {
                required,
                gas_limit: transaction.gas_limit(),
            }
            .into());
        }

        if transaction.chain_id().is_none() {
            let (number, timestamp) = self.account_reader.head();
            if self.chain_spec.is_fork_active_at(Hardfork::SpuriousDragon, number, timestamp) {
                return Err(InvalidPoolTransactionError::ChainIdMismatch {
                    expected: self.chain_spec.chain.id(),
                    got: None,
                }
                .into());
            }
        }

        if transaction.blob_count() > 0 && !transaction.has_blob_sidecar() {
            return Err(InvalidPoolTransactionError::MissingBlobSidecar.into());
        }

        let _ = origin;
        Ok(())
    }

    /// Places `transaction` into the correct sub-map, replacing a prior
    /// same-`(sender, nonce)` entry only if the price-bump rule clears
    /// (§4.3 invariant), unless the incoming transaction is local (§3,
    /// `isLocal` is exempt from the bump rule).
    fn replace_or_insert(
        &self,
        inner: &mut Inner<T>,
        sender: Address,
        transaction: T,
        origin: TransactionOrigin,
        account_nonce: u64,
    ) -> PoolResult<()> {
        let nonce = transaction.nonce();
        let hash = transaction.hash();

        let existing = inner
            .pending
            .get(&sender)
            .and_then(|m| m.get(&nonce))
            .or_else(|| inner.queued.get(&sender).and_then(|m| m.get(&nonce)))
            .cloned();

        if let Some(existing) = existing {
            if !origin.is_local() {
                let required = existing
                    .transaction
                    .max_fee_per_gas()
                    .saturating_mul(100 + self.config.price_bump_percent)
                    / 100;
                if transaction.max_fee_per_gas() < required {
                    return Err(PoolError::ReplacementUnderpriced {
                        sender,
                        nonce,
                        required_fee: required,
                        given_fee: transaction.max_fee_per_gas(),
                    });
                }
            }
            self.remove_entry(inner, existing.transaction.hash());
        }

        let entry = Arc::new(ValidPoolTransaction { transaction, added: self.next_added(), origin });

        for versioned_hash in entry.transaction.blob_versioned_hashes() {
            inner.kzg_proof_index.insert(versioned_hash, hash);
            inner.cell_proof_index.insert(versioned_hash, hash);
        }
        inner.blob_bytes += entry.transaction.blob_count() as u64
            * alloy_eips::eip4844::DATA_GAS_PER_BLOB;

        inner.by_hash.insert(hash, entry.clone());

        // Place provisionally into queued; `promote_executables` sorts
        // out which queued entries are actually pending-eligible right
        // after `add` returns, so every insertion goes through one path.
        let _ = account_nonce;
        inner.queued.entry(sender).or_default().insert(nonce, entry);
        Ok(())
    }

    fn remove_entry(&self, inner: &mut Inner<T>, hash: TxHash) -> Option<Arc<ValidPoolTransaction<T>>> {
        let entry = inner.by_hash.remove(&hash)?;
        let sender = entry.transaction.sender();
        let nonce = entry.transaction.nonce();
        if let Some(map) = inner.pending.get_mut(&sender) {
            map.remove(&nonce);
            if map.is_empty() {
                inner.pending.remove(&sender);
            }
        }
        if let Some(map) = inner.queued.get_mut(&sender) {
            map.remove(&nonce);
            if map.is_empty() {
                inner.queued.remove(&sender);
            }
        }
        inner.blob_bytes =
            inner.blob_bytes.saturating_sub(entry.transaction.blob_count() as u64
                * alloy_eips::eip4844::DATA_GAS_PER_BLOB);
        Some(entry)
    }

    /// `removeByHash(hash)` (§4.3).
    pub fn remove_by_hash(&self, hash: TxHash) -> Option<T> {
        let mut inner = self.inner.write();
        self.remove_entry(&mut inner, hash).map(|e| e.transaction.clone())
    }

    /// `removeNewBlockTxs(blocks)` (§4.3): strips every transaction that
    /// is now included in a canonical block.
    pub fn remove_mined(&self, hashes: impl IntoIterator<Item = TxHash>) {
        let mut inner = self.inner.write();
        for hash in hashes {
            self.remove_entry(&mut inner, hash);
        }
    }

    /// `promoteExecutables()` (§4.3): re-evaluates every sender with a
    /// queued entry against the latest head state, moving a prefix of
    /// contiguous, affordable nonces starting at the account's current
    /// nonce from `queued` into `pending`.
    pub fn promote_executables(&self) {
        let mut inner = self.inner.write();
        let senders: Vec<Address> = inner.queued.keys().chain(inner.pending.keys()).copied().collect::<HashSet<_>>().into_iter().collect();

        for sender in senders {
            let (account_nonce, mut balance) = self.account_reader.account(sender);
            self.reconcile_sender(&mut inner, sender, account_nonce, &mut balance);
        }
    }

    /// `demoteUnexecutables()` (§4.3): the inverse direction of
    /// [`Self::promote_executables`] — pulled into the same pass here
    /// since both read the identical head snapshot and a sender's
    /// pending/queued partition is recomputed from scratch each time
    /// rather than patched incrementally.
    pub fn demote_unexecutables(&self) {
        self.promote_executables();
    }

    /// Recomputes one sender's pending/queued split against
    /// `(account_nonce, balance)`, draining `balance` as contiguous
    /// nonces are accepted so a sender can't pend two transactions whose
    /// combined cost exceeds what they actually hold.
    fn reconcile_sender(
        &self,
        inner: &mut Inner<T>,
        sender: Address,
        account_nonce: u64,
        balance: &mut U256,
    ) {
        let mut all: BTreeMap<u64, Arc<ValidPoolTransaction<T>>> =
            inner.pending.remove(&sender).unwrap_or_default();
        all.extend(inner.queued.remove(&sender).unwrap_or_default());

        let mut pending = BTreeMap::new();
        let mut queued = BTreeMap::new();
        let mut expected = account_nonce;
        let mut stop = false;

        for (nonce, entry) in all {
            if nonce < account_nonce {
                // Already included or superseded; drop silently, same
                // as the teacher's mined-transaction cleanup.
                inner.by_hash.remove(&entry.transaction.hash());
                continue;
            }
            if stop || nonce != expected || entry.transaction.cost() > *balance {
                stop = true;
                queued.insert(nonce, entry);
                continue;
            }
            *balance = balance.saturating_sub(entry.transaction.cost());
            pending.insert(nonce, entry);
            expected += 1;
        }

        if !pending.is_empty() {
            inner.pending.insert(sender, pending);
        }
        if !queued.is_empty() {
            inner.queued.insert(sender, queued);
        }
    }

    /// `handleReorg(oldBlocks, newBlocks)` (§4.3): re-validates every
    /// sender against the new head.
    ///
    /// Re-injecting the transactions displaced by `old_blocks` is the
    /// caller's job: reconstructing a `T: PoolTransaction` from a raw
    /// block envelope is a chain-layer concern this pool doesn't own, so
    /// the caller calls [`Self::reinject`] per displaced transaction
    /// before calling this method (see
    /// `BeaconConsensusEngine::handle_reorg`). What's left here is
    /// re-running the pending/queued split against the post-reorg head.
    pub fn handle_reorg(&self, _old_blocks: &[SealedBlock], _new_blocks: &[SealedBlock]) {
        self.promote_executables();
    }

    /// Re-inserts a transaction that was displaced by a reorg (§4.3, §8
    /// property 7). Ownership mirrors `add`: a failed re-insertion (e.g.
    /// the sender can no longer afford it) is simply dropped.
    pub fn reinject(&self, transaction: T) {
        let _ = self.add(transaction, TransactionOrigin::External);
    }

    /// `txsByPriceAndNonce(vm, {...})` (§4.3): the block builder's
    /// profit-maximizing, nonce-ordered view over every currently
    /// pending transaction.
    pub fn best_transactions(&self, attributes: BestTransactionsAttributes) -> BestTransactions<T> {
        let inner = self.inner.read();
        let per_sender = inner
            .pending
            .iter()
            .map(|(sender, txs)| (*sender, txs.values().cloned().collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        BestTransactions::new(per_sender, attributes)
    }

    /// O(1) lookup by transaction hash.
    pub fn get(&self, hash: &TxHash) -> Option<Arc<ValidPoolTransaction<T>>> {
        self.inner.read().by_hash.get(hash).cloned()
    }

    /// Number of pending transactions for `sender`.
    pub fn pending_count(&self, sender: Address) -> usize {
        self.inner.read().pending.get(&sender).map_or(0, BTreeMap::len)
    }

    /// Number of queued transactions for `sender`.
    pub fn queued_count(&self, sender: Address) -> usize {
        self.inner.read().queued.get(&sender).map_or(0, BTreeMap::len)
    }

    /// Total pooled transaction count (pending + queued).
    pub fn len(&self) -> usize {
        self.inner.read().total_len()
    }

    /// Whether the pool holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::EthPooledTransaction;
    use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
    use alloy_primitives::Signature;
    use execution_chainspec::ChainSpecBuilder;
    use execution_primitives::TransactionSignedEcRecovered;

    struct FixedAccount {
        nonce: u64,
        balance: U256,
    }
    impl PoolAccountReader for FixedAccount {
        fn account(&self, _sender: Address) -> (u64, U256) {
            (self.nonce, self.balance)
        }

        fn head(&self) -> (u64, u64) {
            (0, 0)
        }
    }

    fn tx(nonce: u64, max_fee: u128, sender: Address) -> EthPooledTransaction {
        let inner = TxEip1559 {
            chain_id: 1,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: 1,
            to: alloy_primitives::TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            ..Default::default()
        };
        let signature = Signature::test_signature();
        let envelope = TxEnvelope::Eip1559(inner.into_signed(signature));
        EthPooledTransaction::new(TransactionSignedEcRecovered::from_signed_transaction(envelope, sender))
    }

    fn pool() -> TxPool<EthPooledTransaction, FixedAccount> {
        let spec = Arc::new(ChainSpecBuilder::new().build());
        let account = Arc::new(FixedAccount { nonce: 0, balance: U256::from(u128::MAX) });
        TxPool::new(spec, account, PoolConfig::default())
    }

    #[test]
    fn nonce_zero_goes_straight_to_pending() {
        let pool = pool();
        let sender = Address::repeat_byte(7);
        pool.add(tx(0, 100, sender), TransactionOrigin::Local).unwrap();
        assert_eq!(pool.pending_count(sender), 1);
        assert_eq!(pool.queued_count(sender), 0);
    }

    #[test]
    fn nonce_gap_stays_queued() {
        let pool = pool();
        let sender = Address::repeat_byte(8);
        pool.add(tx(1, 100, sender), TransactionOrigin::Local).unwrap();
        assert_eq!(pool.pending_count(sender), 0);
        assert_eq!(pool.queued_count(sender), 1);
    }

    #[test]
    fn filling_the_gap_promotes_both() {
        let pool = pool();
        let sender = Address::repeat_byte(9);
        pool.add(tx(1, 100, sender), TransactionOrigin::Local).unwrap();
        pool.add(tx(0, 100, sender), TransactionOrigin::Local).unwrap();
        assert_eq!(pool.pending_count(sender), 2);
        assert_eq!(pool.queued_count(sender), 0);
    }

    #[test]
    fn underpriced_replacement_rejected() {
        let pool = pool();
        let sender = Address::repeat_byte(10);
        pool.add(tx(0, 100, sender), TransactionOrigin::External).unwrap();
        let err = pool.add(tx(0, 101, sender), TransactionOrigin::External).unwrap_err();
        assert!(matches!(err, PoolError::ReplacementUnderpriced { .. }));
    }

    #[test]
    fn sufficient_bump_replaces_entry() {
        let pool = pool();
        let sender = Address::repeat_byte(11);
        pool.add(tx(0, 100, sender), TransactionOrigin::External).unwrap();
        pool.add(tx(0, 111, sender), TransactionOrigin::External).unwrap();
        assert_eq!(pool.pending_count(sender), 1);
    }

    #[test]
    fn remove_by_hash_clears_entry() {
        let pool = pool();
        let sender = Address::repeat_byte(12);
        let hash = pool.add(tx(0, 100, sender), TransactionOrigin::Local).unwrap();
        assert!(pool.remove_by_hash(hash).is_some());
        assert_eq!(pool.len(), 0);
    }
}
