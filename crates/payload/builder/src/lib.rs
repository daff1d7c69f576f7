//! The payload-id keyed build cache and `start`/`build`/`stop` lifecycle
//! around pending-block assembly (§4.4).
//!
//! [`execution_payload_basic::build_payload`] owns the actual selection
//! loop (steps 2-7 of `start()`); this crate owns the cache entry
//! bookkeeping (step 1, the 2-second/2-entry cache hit in step 2, LRU
//! eviction in step 3) and the `build`/`stop` verbs the Engine API calls
//! afterward.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use alloy_primitives::BlockHash;
use execution_chainspec::ChainSpec;
use execution_errors::ExecutionError;
use execution_evm::execute::BlockExecutorProvider;
use execution_payload_basic::{build_payload, CancelBuild, PayloadConfig};
use execution_payload_primitives::{BuiltPayload, PayloadBuilderAttributes, PayloadId};
use execution_primitives_traits::SealedHeader;
use execution_revm::InMemoryState;
use execution_transaction_pool::{PoolAccountReader, PoolTransaction, TxPool};
use parking_lot::Mutex;

/// `MAX=2` (§4.4 step 3): at most this many distinct builds are kept
/// warm at once.
pub const MAX_CACHED_PAYLOADS: usize = 2;

/// The window in which a repeated `start()` for the same id and parent
/// hash is served from cache instead of rebuilding (§4.4 step 2).
pub const PAYLOAD_CACHE_TTL: Duration = Duration::from_millis(2000);

struct CacheEntry {
    config: PayloadConfig,
    created_at: Instant,
    cancel: CancelBuild,
    best: BuiltPayload,
}

/// Owns the live set of in-progress/cached builds, keyed by payload id.
///
/// Exposes the three verbs the Engine API drives (`forkchoiceUpdated`
/// calls `start`, `getPayload` calls `build`, and a superseded build is
/// `stop`ped), generic over the same pool/executor types
/// [`execution_payload_basic::build_payload`] is.
pub struct PayloadBuilderHandle<T: PoolTransaction, A: PoolAccountReader, EF> {
    chain_spec: Arc<ChainSpec>,
    executor_provider: Arc<EF>,
    state: Arc<InMemoryState>,
    pool: Arc<TxPool<T, A>>,
    entries: Mutex<HashMap<PayloadId, CacheEntry>>,
    insertion_order: Mutex<Vec<PayloadId>>,
}

impl<T, A, EF> PayloadBuilderHandle<T, A, EF>
where
    T: PoolTransaction,
    A: PoolAccountReader,
    EF: BlockExecutorProvider,
{
    /// Builds a handle over the given chain spec, executor, VM state and
    /// pool. `state` is expected to be the VM execution engine's live
    /// state manager; every build takes a `shallow_copy()` of it inside
    /// [`build_payload`], never mutating the original.
    pub fn new(
        chain_spec: Arc<ChainSpec>,
        executor_provider: Arc<EF>,
        state: Arc<InMemoryState>,
        pool: Arc<TxPool<T, A>>,
    ) -> Self {
        Self {
            chain_spec,
            executor_provider,
            state,
            pool,
            entries: Mutex::new(HashMap::new()),
            insertion_order: Mutex::new(Vec::new()),
        }
    }

    /// `start(vm, parentBlock, attributes, withdrawals?)` (§4.4).
    ///
    /// Returns the payload id of the (possibly cached) build. A cache
    /// hit requires the same id, the same parent hash, and a build
    /// younger than [`PAYLOAD_CACHE_TTL`].
    pub fn start(
        &self,
        parent: &SealedHeader,
        attributes: PayloadBuilderAttributes,
    ) -> Result<PayloadId, ExecutionError> {
        let id = attributes.id;

        if let Some(entry) = self.entries.lock().get(&id) {
            if entry.config.parent.hash() == parent.hash()
                && entry.created_at.elapsed() < PAYLOAD_CACHE_TTL
            {
                return Ok(id);
            }
        }

        self.evict_to_capacity(&id);

        let cancel = CancelBuild::new();
        let config =
            PayloadConfig { parent: parent.clone(), attributes, gas_limit: parent.gas_limit };

        let best = build_payload(
            &self.chain_spec,
            self.executor_provider.as_ref(),
            self.state.as_ref(),
            self.pool.as_ref(),
            &config,
            &cancel,
        )?;

        self.entries
            .lock()
            .insert(id, CacheEntry { config, created_at: Instant::now(), cancel, best });
        self.insertion_order.lock().push(id);

        tracing::debug!(target: "payload::builder", %id, "started payload build");
        Ok(id)
    }

    /// `build(payloadId)` (§4.4): finalizes the block, re-running the
    /// selection loop against the pool's current contents so
    /// transactions that arrived after `start` are picked up. Returns
    /// `None` if the id is unknown or the build was [`Self::stop`]ped.
    pub fn build(&self, id: PayloadId) -> Result<Option<BuiltPayload>, ExecutionError> {
        let Some((config, cancel)) = self.entries.lock().get(&id).and_then(|entry| {
            (!entry.cancel.is_cancelled()).then(|| (entry.config.clone(), entry.cancel.clone()))
        }) else {
            return Ok(None);
        };

        let rebuilt = build_payload(
            &self.chain_spec,
            self.executor_provider.as_ref(),
            self.state.as_ref(),
            self.pool.as_ref(),
            &config,
            &cancel,
        )?;

        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.best = rebuilt.clone();
        }
        Ok(Some(rebuilt))
    }

    /// `stop(payloadId)` (§4.4): discards the cache entry and signals
    /// any in-flight selection loop to abort at its next check.
    pub fn stop(&self, id: PayloadId) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            entry.cancel.cancel();
        }
        self.insertion_order.lock().retain(|cached| *cached != id);
    }

    fn evict_to_capacity(&self, incoming: &PayloadId) {
        let mut order = self.insertion_order.lock();
        if order.contains(incoming) {
            return;
        }
        while order.len() >= MAX_CACHED_PAYLOADS {
            let oldest = order.remove(0);
            self.entries.lock().remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use execution_chainspec::ChainSpecBuilder;
    use execution_evm::execute::BasicBlockExecutorProvider;
    use execution_payload_primitives::PayloadAttributes;
    use execution_primitives_traits::Header;
    use execution_revm::EthExecutionStrategyFactory;
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

    fn genesis_header() -> SealedHeader {
        Header { number: 0, gas_limit: 30_000_000, ..Default::default() }.seal_slow()
    }

    fn handle() -> PayloadBuilderHandle<
        EthPooledTransaction,
        ZeroAccountReader,
        BasicBlockExecutorProvider<EthExecutionStrategyFactory>,
    > {
        let chain_spec = Arc::new(ChainSpecBuilder::new().build());
        let factory = EthExecutionStrategyFactory::new(chain_spec.clone());
        let executor_provider = Arc::new(BasicBlockExecutorProvider::new(factory));
        let state = Arc::new(InMemoryState::new());
        let pool = Arc::new(TxPool::new(chain_spec.clone(), Arc::new(ZeroAccountReader), PoolConfig::default()));
        PayloadBuilderHandle::new(chain_spec, executor_provider, state, pool)
    }

    fn attributes(parent: &SealedHeader) -> PayloadBuilderAttributes {
        PayloadBuilderAttributes::new(
            parent.hash(),
            PayloadAttributes {
                timestamp: parent.timestamp + 12,
                prev_randao: Default::default(),
                suggested_fee_recipient: Default::default(),
                withdrawals: None,
                parent_beacon_block_root: None,
            },
        )
    }

    #[test]
    fn start_is_idempotent_within_ttl() {
        let handle = handle();
        let parent = genesis_header();

        let first = handle.start(&parent, attributes(&parent)).unwrap();
        let second = handle.start(&parent, attributes(&parent)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn build_returns_the_cached_payload() {
        let handle = handle();
        let parent = genesis_header();

        let id = handle.start(&parent, attributes(&parent)).unwrap();
        let built = handle.build(id).unwrap();
        assert!(built.is_some());
        assert_eq!(built.unwrap().id, id);
    }

    #[test]
    fn stop_discards_the_cache_entry() {
        let handle = handle();
        let parent = genesis_header();

        let id = handle.start(&parent, attributes(&parent)).unwrap();
        handle.stop(id);
        assert!(handle.build(id).unwrap().is_none());
    }

    #[test]
    fn lru_eviction_drops_the_oldest_entry_past_capacity() {
        let handle = handle();
        let parent = genesis_header();

        let mut ids = Vec::new();
        for i in 0..(MAX_CACHED_PAYLOADS + 1) {
            let attrs = PayloadBuilderAttributes::new(
                parent.hash(),
                PayloadAttributes {
                    timestamp: parent.timestamp + 12 + i as u64,
                    prev_randao: Default::default(),
                    suggested_fee_recipient: Default::default(),
                    withdrawals: None,
                    parent_beacon_block_root: None,
                },
            );
            ids.push(handle.start(&parent, attrs).unwrap());
        }

        assert!(handle.build(ids[0]).unwrap().is_none());
        assert!(handle.build(*ids.last().unwrap()).unwrap().is_some());
    }
}
