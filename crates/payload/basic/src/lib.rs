//! Pending-block assembly (§4.4): given a parent header and a set of
//! build attributes, select transactions from the pool's price-sorted
//! iterator and execute them into a candidate block.
//!
//! This crate owns steps 2-7 of `start()`/`build()`; the payload id and
//! the 2-entry/2-second-TTL cache around repeated `build()` calls live in
//! `execution-payload-builder`.

use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

use alloy_consensus::{Header, EMPTY_OMMER_ROOT_HASH};
use alloy_eips::merge::BEACON_NONCE;
use alloy_primitives::{Bloom, B256, U256};
use execution_chainspec::ChainSpec;
use execution_errors::ExecutionError;
use execution_evm::execute::{BlockExecutorProvider, Executor};
use execution_execution_errors::{BlockExecutionError, BlockValidationError};
use execution_execution_types::BlockExecutionInput;
use execution_payload_primitives::{BuiltPayload, PayloadBuilderAttributes};
use execution_primitives::{proofs, Block, BlockBody, Receipt, Receipts, SealedHeader};
use execution_primitives_traits::constants::{GAS_PER_BLOB, MAX_BLOBS_PER_BLOCK_CANCUN, MIN_TRANSACTION_GAS};
use execution_revm::{InMemoryState, StateProviderDatabase};
use execution_transaction_pool::{BestTransactionsAttributes, PoolTransaction, TxPool, PoolAccountReader};
use revm_primitives::{EVMError, InvalidTransaction};

/// The static configuration a build is pinned against: the parent header
/// it extends and the requested attributes.
#[derive(Debug, Clone)]
pub struct PayloadConfig {
    /// Header of the block this payload extends.
    pub parent: SealedHeader,
    /// Requested build attributes (§4.4).
    pub attributes: PayloadBuilderAttributes,
    /// Gas limit target for the new block, defaulting to the parent's.
    pub gas_limit: u64,
}

/// A flag an in-progress build checks between transactions so a fresh
/// `CHAIN_UPDATED`/`stop()` can abort it without waiting for the
/// selection loop to drain the pool (§4.4 `stop(payloadId)`).
#[derive(Debug, Clone, Default)]
pub struct CancelBuild(Arc<AtomicBool>);

impl CancelBuild {
    /// A fresh, unset cancellation flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the in-progress build.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Assembles and executes a candidate block for `config`, pulling
/// transactions from `pool`'s price-sorted iterator (§4.4 steps 2-7).
pub fn build_payload<T, A, EF>(
    chain_spec: &ChainSpec,
    executor_provider: &EF,
    state: &InMemoryState,
    pool: &TxPool<T, A>,
    config: &PayloadConfig,
    cancel: &CancelBuild,
) -> Result<BuiltPayload, ExecutionError>
where
    T: PoolTransaction,
    A: PoolAccountReader,
    EF: BlockExecutorProvider,
{
    let parent = &config.parent;
    let attributes = &config.attributes.attributes;

    let base_fee = parent
        .next_block_base_fee(chain_spec.base_fee_params)
        .unwrap_or(execution_primitives_traits::constants::EIP1559_INITIAL_BASE_FEE);

    let cancun_active = chain_spec.is_cancun_active_at_timestamp(attributes.timestamp);
    let allowed_blob_gas =
        if cancun_active { MAX_BLOBS_PER_BLOCK_CANCUN * GAS_PER_BLOB } else { 0 };

    let withdrawals = attributes.withdrawals.clone().map(|w| {
        execution_primitives_traits::Withdrawals::new(w)
    });
    let withdrawals_root = withdrawals.as_ref().map(proofs::calculate_withdrawals_root);

    let excess_blob_gas = if cancun_active {
        Some(parent.next_block_excess_blob_gas().unwrap_or(0))
    } else {
        None
    };

    // Every field the EVM environment or the post-execution system calls
    // need is known up front; transactions_root/receipts_root/logs_bloom/
    // gas_used/state_root/blob_gas_used are filled in once the selection
    // loop below knows what actually got included.
    let mut header = Header {
        parent_hash: parent.hash(),
        ommers_hash: EMPTY_OMMER_ROOT_HASH,
        beneficiary: attributes.suggested_fee_recipient,
        state_root: B256::ZERO,
        transactions_root: B256::ZERO,
        receipts_root: B256::ZERO,
        logs_bloom: Bloom::ZERO,
        difficulty: U256::ZERO,
        number: parent.number + 1,
        gas_limit: config.gas_limit,
        gas_used: 0,
        timestamp: attributes.timestamp,
        extra_data: Default::default(),
        mix_hash: attributes.prev_randao,
        nonce: BEACON_NONCE.into(),
        base_fee_per_gas: Some(base_fee),
        withdrawals_root,
        blob_gas_used: cancun_active.then_some(0),
        excess_blob_gas,
        parent_beacon_block_root: attributes.parent_beacon_block_root,
        requests_hash: None,
    };

    let db = StateProviderDatabase::new(state.shallow_copy());
    let mut executor = executor_provider.executor(db);

    let draft = Block {
        header: header.clone(),
        body: BlockBody { transactions: Vec::new(), ommers: Vec::new(), withdrawals: withdrawals.clone(), requests: None },
    }
    .seal_slow();
    executor
        .open_block(&BlockExecutionInput::new(&draft, U256::ZERO, None))
        .map_err(ExecutionError::Execution)?;

    let mut cumulative_gas_used = 0u64;
    let mut blob_gas_used = 0u64;
    let mut included = Vec::new();
    let mut receipts = Vec::new();
    let mut block_full = false;

    let mut best = pool.best_transactions(BestTransactionsAttributes::for_base_fee(base_fee));
    while !block_full {
        let Some(pooled) = best.peek().cloned() else { break };
        if cancel.is_cancelled() {
            break;
        }

        let tx = &pooled.transaction;

        let remaining = config.gas_limit.saturating_sub(cumulative_gas_used);
        if remaining < tx.gas_limit() {
            if remaining < MIN_TRANSACTION_GAS {
                block_full = true;
            }
            best.shift();
            continue;
        }

        let tx_blob_gas = tx.blob_count() as u64 * GAS_PER_BLOB;
        if blob_gas_used + tx_blob_gas > allowed_blob_gas {
            if blob_gas_used >= allowed_blob_gas {
                block_full = true;
            }
            best.shift();
            continue;
        }

        let (signed, signer) = tx.to_consensus().split();
        match executor.execute_transaction(&header, U256::ZERO, cumulative_gas_used, &signed, signer) {
            Ok((receipt, gas_used)) => {
                cumulative_gas_used += gas_used;
                blob_gas_used += tx_blob_gas;
                receipts.push(receipt);
                included.push(pooled);
                best.shift();
            }
            Err(err) => {
                if is_recoverable(&err) {
                    // e.g. nonce too low against the speculative state:
                    // a later nonce from the same sender may still apply.
                    best.shift();
                } else {
                    let hash = tx.hash();
                    best.pop();
                    pool.remove_by_hash(hash);
                }
            }
        }
    }

    let transactions: Vec<execution_primitives::TransactionSigned> =
        included.iter().map(|tx| tx.transaction.to_consensus().split().0).collect();
    header.transactions_root = proofs::calculate_transaction_root(&transactions);

    let body = BlockBody { transactions, ommers: Vec::new(), withdrawals, requests: None };
    let candidate = Block { header, body }.seal_slow();

    let input = BlockExecutionInput::new(&candidate, U256::ZERO, None);
    let (requests, state_diff) =
        executor.finish_block(&input, &receipts).map_err(ExecutionError::Execution)?;

    let receipts = Receipts(receipts);
    let receipts_root = proofs::calculate_receipt_root(&receipts.0);
    let logs_bloom = receipts.bloom();

    let fees = compute_fees(&included, &receipts, base_fee);

    let Block { mut header, body } = candidate.unseal();
    header.gas_used = cumulative_gas_used;
    header.receipts_root = receipts_root;
    header.logs_bloom = logs_bloom;
    header.state_root = {
        let scratch = state.shallow_copy();
        scratch.commit_bundle(&state_diff);
        scratch.pseudo_state_root()
    };
    if cancun_active {
        header.blob_gas_used = Some(blob_gas_used);
    }

    let sealed = Block { header, body }.seal_slow();

    Ok(BuiltPayload {
        id: config.attributes.id,
        block: Arc::new(sealed),
        receipts: Arc::new(receipts),
        fees,
        sidecars: None,
        requests: requests.into_iter().next(),
    })
}

/// Whether `err` is recoverable at the pool level (§4.4 `SkippedErrors`):
/// the transaction's own nonce raced ahead of the speculative state built
/// by earlier acceptances in this same selection loop, so a later nonce
/// from the same sender may still execute. Anything else — insufficient
/// balance, a bad signature, an unsupported tx type — means every
/// remaining transaction from this sender is dead for this block
/// (`RemovedErrors`), so the caller also purges it from the pool.
fn is_recoverable(err: &BlockExecutionError) -> bool {
    matches!(
        err,
        BlockExecutionError::Validation(BlockValidationError::EVM { error, .. })
            if matches!(**error, EVMError::Transaction(InvalidTransaction::NonceTooLow { .. }))
    )
}

fn compute_fees<T: PoolTransaction>(
    included: &[Arc<execution_transaction_pool::ValidPoolTransaction<T>>],
    receipts: &Receipts,
    base_fee: u64,
) -> U256 {
    let mut previous_cumulative = 0u64;
    let mut total = U256::ZERO;
    for (tx, receipt) in included.iter().zip(receipts.0.iter()) {
        let cumulative = match receipt {
            Receipt::Legacy(r) | Receipt::Eip2930(r) | Receipt::Eip1559(r) | Receipt::Eip4844(r) => {
                r.receipt.cumulative_gas_used
            }
            Receipt::Eip7702(r) => r.receipt.cumulative_gas_used,
        };
        let gas_used = cumulative.saturating_sub(previous_cumulative);
        previous_cumulative = cumulative;
        if let Some(tip) = tx.transaction.effective_tip_per_gas(base_fee) {
            total += U256::from(tip).saturating_mul(U256::from(gas_used));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
    use alloy_primitives::{Address, Signature, TxKind};
    use alloy_rpc_types_engine::PayloadAttributes;
    use execution_chain_state::{BlockCacheLimits, ChainStore};
    use execution_chainspec::ChainSpecBuilder;
    use execution_evm::execute::BasicBlockExecutorProvider;
    use execution_primitives::TransactionSignedEcRecovered;
    use execution_revm::{EthExecutionStrategyFactory, VmExecutionEngine, VmExecutionEngineConfig};
    use execution_transaction_pool::{EthPooledTransaction, PoolConfig, TransactionOrigin};

    #[test]
    fn cancel_build_starts_unset() {
        let cancel = CancelBuild::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }

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

    fn tx(nonce: u64, sender: Address) -> EthPooledTransaction {
        let inner = TxEip1559 {
            chain_id: 1,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 1,
            to: TxKind::Call(Address::ZERO),
            value: U256::ZERO,
            ..Default::default()
        };
        let envelope = TxEnvelope::Eip1559(inner.into_signed(Signature::test_signature()));
        EthPooledTransaction::new(TransactionSignedEcRecovered::from_signed_transaction(envelope, sender))
    }

    fn genesis() -> execution_primitives::SealedBlock {
        Block { header: Header { number: 0, gas_limit: 30_000_000, ..Default::default() }, body: BlockBody::default() }
            .seal_slow()
    }

    fn harness() -> (
        Arc<ChainSpec>,
        InMemoryState,
        Arc<TxPool<EthPooledTransaction, FixedAccount>>,
        BasicBlockExecutorProvider<EthExecutionStrategyFactory>,
    ) {
        let chain_spec = Arc::new(ChainSpecBuilder::new().build());
        let chain_store = Arc::new(ChainStore::new(genesis(), BlockCacheLimits::default()));
        let factory = EthExecutionStrategyFactory::new(chain_spec.clone());
        let vm = Arc::new(VmExecutionEngine::new(
            chain_store.clone(),
            chain_spec.clone(),
            factory.clone(),
            VmExecutionEngineConfig::default(),
        ));
        vm.open().unwrap();
        let account = Arc::new(FixedAccount { nonce: 0, balance: U256::from(u128::MAX) });
        let pool = Arc::new(TxPool::new(chain_spec.clone(), account, PoolConfig::default()));
        let executor_provider = BasicBlockExecutorProvider::new(factory);
        (chain_spec, vm.state_handle(), pool, executor_provider)
    }

    fn config(parent: &execution_primitives::SealedBlock) -> PayloadConfig {
        let attributes = PayloadBuilderAttributes::new(
            parent.hash(),
            PayloadAttributes {
                timestamp: parent.header.timestamp + 12,
                prev_randao: B256::ZERO,
                suggested_fee_recipient: Address::ZERO,
                withdrawals: None,
                parent_beacon_block_root: None,
            },
        );
        PayloadConfig { parent: parent.header.clone(), attributes, gas_limit: parent.header.gas_limit }
    }

    #[test]
    fn empty_pool_builds_an_empty_block() {
        let (chain_spec, state, pool, executor_provider) = harness();
        let parent = genesis();
        let cfg = config(&parent);

        let payload =
            build_payload(&chain_spec, &executor_provider, &state, &pool, &cfg, &CancelBuild::new()).unwrap();

        assert!(payload.block.body.transactions.is_empty());
        assert_eq!(payload.block.header.gas_used, 0);
        assert_eq!(payload.fees, U256::ZERO);
    }

    #[test]
    fn includes_a_pending_transaction_and_drains_the_pool() {
        let (chain_spec, state, pool, executor_provider) = harness();
        let sender = Address::repeat_byte(7);
        pool.add(tx(0, sender), TransactionOrigin::Local).unwrap();

        let parent = genesis();
        let cfg = config(&parent);
        let payload =
            build_payload(&chain_spec, &executor_provider, &state, &pool, &cfg, &CancelBuild::new()).unwrap();

        assert_eq!(payload.block.body.transactions.len(), 1);
        assert_eq!(payload.block.header.gas_used, 21_000);
        assert_eq!(pool.pending_count(sender), 0);
    }
}
