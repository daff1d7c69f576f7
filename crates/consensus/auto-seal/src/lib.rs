//! Local single-node block production (§4.7): a periodic assembler that
//! mirrors the transaction-selection half of
//! [`execution_payload_basic::build_payload`] but seals a real pre-merge
//! header (non-zero difficulty, a nonce and mix hash) instead of the
//! post-merge shape `newPayload`/`getPayload` exchange.
//!
//! The actual ethash proof-of-work search is an external capability this
//! core does not implement (crypto primitives are out of scope); it is
//! modeled here as the [`PowSealer`] trait, the same way the teacher's
//! devp2p transport and JSON-RPC server are modeled as collaborators
//! rather than reimplemented.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_consensus::{Header, EMPTY_OMMER_ROOT_HASH};
use alloy_primitives::{Address, Bloom, Bytes, B256, U256};
use execution_chain_state::ChainStore;
use execution_chainspec::ChainSpec;
use execution_consensus_common::calc::calc_next_block_difficulty;
use execution_errors::ExecutionError;
use execution_evm::execute::{
    BasicBlockExecutorProvider, BlockExecutionStrategyFactory, BlockExecutorProvider, Executor,
};
use execution_execution_types::BlockExecutionInput;
use execution_primitives::{proofs, Block, BlockBody, Receipts};
use execution_primitives_traits::constants::EIP1559_INITIAL_BASE_FEE;
use execution_revm::{StateProviderDatabase, VmExecutionEngine};
use execution_storage_api::{CanonStateTracker, TotalDifficultyProvider};
use execution_transaction_pool::{BestTransactionsAttributes, PoolAccountReader, PoolTransaction, TxPool};
use tokio::task::JoinHandle;

/// A pre-merge proof-of-work search over an assembled header.
///
/// `interrupted` is polled periodically during the search (at minimum
/// once before returning); a sealer that sees it return `true` should
/// abandon the attempt and return `None` rather than keep burning cycles
/// on a header the chain has already moved past (§4.7 "a fresh head
/// arriving mid-search cancels the in-flight attempt").
pub trait PowSealer: Send + Sync + 'static {
    /// Finds `(nonce, mix_hash)` for `header`, or `None` if interrupted
    /// before a solution was found.
    fn seal(&self, header: &Header, interrupted: &dyn Fn() -> bool) -> Option<(u64, B256)>;
}

/// A sealer that accepts the first header it sees, for tests and local
/// development. Not a real proof of work — the nonce and mix hash it
/// returns satisfy no difficulty target.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSeal;

impl PowSealer for InstantSeal {
    fn seal(&self, header: &Header, interrupted: &dyn Fn() -> bool) -> Option<(u64, B256)> {
        if interrupted() {
            return None;
        }
        Some((0, header.parent_hash))
    }
}

/// Tuning knobs for the miner (§4.7).
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Address credited with the block reward.
    pub beneficiary: Address,
    /// `extraData` stamped on every block this node produces.
    pub extra_data: Bytes,
    /// How often a new block is assembled, absent any external trigger.
    pub block_time: Duration,
    /// Gas limit target for produced blocks.
    pub gas_limit: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            beneficiary: Address::ZERO,
            extra_data: Bytes::from_static(b"execution-core"),
            block_time: Duration::from_secs(12),
            gas_limit: 30_000_000,
        }
    }
}

/// A cloneable handle that stops a running [`Miner`]'s background task.
#[derive(Clone)]
pub struct MinerHandle {
    stop: Arc<AtomicBool>,
}

impl MinerHandle {
    /// Requests the miner's loop to exit. An attempt already mid-PoW-search
    /// is allowed to finish and commit rather than being torn down
    /// mid-block (§9 "shutdown lets an in-flight block finish").
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Periodically assembles and seals new blocks from the pool's pending
/// transactions, generic over the VM execution strategy, pool
/// transaction/account types, and the PoW search implementation.
pub struct Miner<F, T, A, S> {
    chain_spec: Arc<ChainSpec>,
    chain_store: Arc<ChainStore>,
    vm: Arc<VmExecutionEngine<F>>,
    executor_provider: Arc<BasicBlockExecutorProvider<F>>,
    pool: Arc<TxPool<T, A>>,
    sealer: S,
    config: MinerConfig,
}

impl<F, T, A, S> Miner<F, T, A, S>
where
    F: BlockExecutionStrategyFactory,
    T: PoolTransaction,
    A: PoolAccountReader,
    S: PowSealer,
{
    /// Builds a miner over the given collaborators. `vm` and
    /// `executor_provider` must share the same strategy factory the rest
    /// of the node was built with.
    pub fn new(
        chain_spec: Arc<ChainSpec>,
        chain_store: Arc<ChainStore>,
        vm: Arc<VmExecutionEngine<F>>,
        executor_provider: Arc<BasicBlockExecutorProvider<F>>,
        pool: Arc<TxPool<T, A>>,
        sealer: S,
        config: MinerConfig,
    ) -> Self {
        Self { chain_spec, chain_store, vm, executor_provider, pool, sealer, config }
    }

    /// Spawns the miner's periodic assembly loop, returning a handle that
    /// can stop it.
    pub fn spawn(self: Arc<Self>) -> (MinerHandle, JoinHandle<()>)
    where
        F: 'static,
        T: 'static,
        A: 'static,
        S: 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = MinerHandle { stop: stop.clone() };
        let miner = self;
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(miner.config.block_time);
            loop {
                interval.tick().await;
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                match miner.try_mine_one(&stop) {
                    Ok(Some(hash)) => {
                        tracing::info!(target: "auto_seal", %hash, "mined block");
                    }
                    Ok(None) => {
                        tracing::debug!(target: "auto_seal", "mining attempt interrupted");
                    }
                    Err(err) => {
                        tracing::warn!(target: "auto_seal", %err, "mining attempt failed");
                    }
                }
            }
        });
        (handle, join)
    }

    /// Assembles, seals and commits one block, or `None` if the PoW
    /// search was interrupted by a fresher head or a stop request.
    pub fn try_mine_one(&self, stop: &Arc<AtomicBool>) -> Result<Option<B256>, ExecutionError> {
        let parent = self.chain_store.canonical_head()?;
        let parent_hash = parent.hash();
        let total_difficulty = self
            .chain_store
            .total_difficulty(parent_hash, parent.number())?
            .unwrap_or_default();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(parent.header.timestamp)
            .max(parent.header.timestamp + 1);

        let difficulty = calc_next_block_difficulty(
            &self.chain_spec,
            parent.number(),
            parent.header.difficulty,
            parent.header.timestamp,
            !parent.body.ommers.is_empty(),
            timestamp,
        );

        let base_fee = self
            .chain_spec
            .is_london_active_at(parent.number() + 1, timestamp)
            .then(|| {
                parent
                    .header
                    .next_block_base_fee(self.chain_spec.base_fee_params)
                    .unwrap_or(EIP1559_INITIAL_BASE_FEE)
            });

        let mut cumulative_gas_used = 0u64;
        let mut included = Vec::new();
        let mut best =
            self.pool.best_transactions(BestTransactionsAttributes::for_base_fee(base_fee.unwrap_or(0)));
        while let Some(pooled) = best.peek().cloned() {
            let tx = &pooled.transaction;
            if cumulative_gas_used + tx.gas_limit() > self.config.gas_limit {
                best.pop();
                continue;
            }
            cumulative_gas_used += tx.gas_limit();
            included.push(pooled);
            best.shift();
        }

        let transactions: Vec<execution_primitives::TransactionSigned> =
            included.iter().map(|tx| tx.transaction.to_consensus().split().0).collect();
        let transactions_root = proofs::calculate_transaction_root(&transactions);

        let header = Header {
            parent_hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: self.config.beneficiary,
            state_root: B256::ZERO,
            transactions_root,
            receipts_root: B256::ZERO,
            logs_bloom: Bloom::ZERO,
            difficulty,
            number: parent.number() + 1,
            gas_limit: self.config.gas_limit,
            gas_used: 0,
            timestamp,
            extra_data: self.config.extra_data.clone(),
            mix_hash: B256::ZERO,
            nonce: Default::default(),
            base_fee_per_gas: base_fee,
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
            requests_hash: None,
        };
        let body = BlockBody { transactions, ommers: Vec::new(), withdrawals: None, requests: None };
        let candidate = Block { header, body }.seal_slow();

        let state = self.vm.state_handle();
        let db = StateProviderDatabase::new(state.shallow_copy());
        let input = BlockExecutionInput::new(&candidate, total_difficulty + difficulty, None);
        let output =
            self.executor_provider.executor(db).execute(input).map_err(ExecutionError::Execution)?;

        let receipts = Receipts(output.receipts);
        let receipts_root = proofs::calculate_receipt_root(&receipts.0);
        let logs_bloom = receipts.bloom();
        let state_root = {
            let scratch = state.shallow_copy();
            scratch.commit_bundle(&output.state);
            scratch.pseudo_state_root()
        };

        let Block { mut header, body } = candidate.unseal();
        header.gas_used = output.gas_used;
        header.receipts_root = receipts_root;
        header.logs_bloom = logs_bloom;
        header.state_root = state_root;

        let interrupt = || {
            stop.load(Ordering::Relaxed)
                || !matches!(self.chain_store.canonical_head(), Ok(b) if b.hash() == parent_hash)
        };
        let Some((nonce, mix_hash)) = self.sealer.seal(&header, &interrupt) else {
            return Ok(None);
        };
        header.nonce = nonce.into();
        header.mix_hash = mix_hash;

        let block = Block { header, body }.seal_slow();
        let hash = block.hash();

        self.vm
            .run_without_set_head(&block, total_difficulty + difficulty, None, true, false)
            .map_err(ExecutionError::Execution)?;
        self.vm.set_head(vec![block.clone()], None, None).map_err(ExecutionError::Execution)?;

        self.pool.remove_mined(block.body.transactions.iter().map(|tx| *tx.tx_hash()));
        self.pool.promote_executables();

        Ok(Some(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_chain_state::BlockCacheLimits;
    use execution_chainspec::ChainSpecBuilder;
    use execution_revm::{EthExecutionStrategyFactory, VmExecutionEngineConfig};
    use execution_transaction_pool::{EthPooledTransaction, PoolConfig};

    struct ZeroAccountReader;
    impl PoolAccountReader for ZeroAccountReader {
        fn account(&self, _sender: Address) -> (u64, U256) {
            (0, U256::MAX)
        }

        fn head(&self) -> (u64, u64) {
            (0, 0)
        }
    }

    fn genesis() -> execution_primitives::SealedBlock {
        Block {
            header: Header { number: 0, gas_limit: 30_000_000, ..Default::default() },
            body: BlockBody::default(),
        }
        .seal_slow()
    }

    fn miner() -> Arc<Miner<EthExecutionStrategyFactory, EthPooledTransaction, ZeroAccountReader, InstantSeal>> {
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
        let executor_provider = Arc::new(BasicBlockExecutorProvider::new(factory));
        let pool = Arc::new(TxPool::new(chain_spec.clone(), Arc::new(ZeroAccountReader), PoolConfig::default()));
        Arc::new(Miner::new(chain_spec, chain_store, vm, executor_provider, pool, InstantSeal, MinerConfig::default()))
    }

    #[test]
    fn mines_an_empty_block_onto_genesis() {
        let miner = miner();
        let stop = Arc::new(AtomicBool::new(false));
        let hash = miner.try_mine_one(&stop).unwrap().expect("mining should succeed");
        assert_eq!(miner.chain_store.canonical_head().unwrap().hash(), hash);
        assert_eq!(miner.chain_store.canonical_head().unwrap().number(), 1);
    }

    #[test]
    fn second_block_extends_the_first() {
        let miner = miner();
        let stop = Arc::new(AtomicBool::new(false));
        miner.try_mine_one(&stop).unwrap();
        let second = miner.try_mine_one(&stop).unwrap().unwrap();
        assert_eq!(miner.chain_store.canonical_head().unwrap().hash(), second);
        assert_eq!(miner.chain_store.canonical_head().unwrap().number(), 2);
    }
}
