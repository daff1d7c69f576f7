//! The Execution Service (§2): owns the chain store, VM execution
//! engine, transaction pool and payload builder, and drives either the
//! beacon engine (post-merge, Engine API driven) or the auto-seal miner
//! (pre-merge/dev, no external consensus client) depending on whether
//! the chain spec activates `Paris` at genesis.
//!
//! This crate has no network, RPC or CLI surface of its own (those are
//! Non-goals per §1) — it is the thing a binary imports and wires a
//! transport on top of.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use execution_auto_seal::{InstantSeal, Miner, MinerConfig, MinerHandle};
use execution_chain_state::{BlockCacheLimits, ChainStore};
use execution_chainspec::ChainSpec;
use execution_consensus_beacon::{BeaconConsensusEngine, BeaconConsensusEngineConfig};
use execution_engine_api::{load_jwt_secret, EngineApi, JwtSecret};
use execution_evm::execute::BasicBlockExecutorProvider;
use execution_payload_builder::PayloadBuilderHandle;
use execution_primitives::{Block, BlockBody};
use execution_revm::{EthExecutionStrategyFactory, InMemoryState, VmExecutionEngine, VmExecutionEngineConfig};
use execution_storage_api::CanonStateTracker;
use execution_transaction_pool::{EthPooledTransaction, PoolAccountReader, PoolConfig, TxPool};
use tokio::task::JoinHandle;
use tracing::info;

/// Reads a sender's `(nonce, balance)` straight out of the VM engine's
/// live state, the pool's only account data source (§4.3 "the pool
/// holds no state of its own"), and the current head's `(number,
/// timestamp)` from the chain store, for the pool's hardfork-dependent
/// validation rules.
#[derive(Debug, Clone)]
pub struct VmStateAccountReader {
    state: InMemoryState,
    chain_store: Arc<ChainStore>,
}

impl VmStateAccountReader {
    /// Wraps a state handle obtained via [`VmExecutionEngine::state_handle`]
    /// together with the chain store it was built against.
    pub fn new(state: InMemoryState, chain_store: Arc<ChainStore>) -> Self {
        Self { state, chain_store }
    }
}

impl PoolAccountReader for VmStateAccountReader {
    fn account(&self, sender: Address) -> (u64, U256) {
        self.state.account(&sender).map(|account| (account.nonce, account.balance)).unwrap_or_default()
    }

    fn head(&self) -> (u64, u64) {
        self.chain_store
            .canonical_head()
            .map(|head| (head.number(), head.header.timestamp))
            .unwrap_or_default()
    }
}

/// Where this node gets its blocks from, decided once at startup from
/// the chain spec (§9 open question: no mid-chain PoW→PoS transition is
/// modeled — a chain is either `Paris`-active at genesis or it isn't).
pub enum Driver<F: execution_evm::execute::BlockExecutionStrategyFactory> {
    /// Post-merge: driven externally via the [`EngineApi`] surface.
    Beacon {
        engine: Arc<BeaconConsensusEngine<F, EthPooledTransaction, VmStateAccountReader>>,
        api: Arc<EngineApi<F, EthPooledTransaction, VmStateAccountReader>>,
    },
    /// Pre-merge / local development: this node produces its own blocks.
    AutoSeal(Arc<Miner<F, EthPooledTransaction, VmStateAccountReader, InstantSeal>>),
}

/// Configuration for assembling a node (§2, §6 "JWT secret file").
pub struct NodeConfig {
    /// The chain this node runs.
    pub chain_spec: Arc<ChainSpec>,
    /// Where the Engine API's JWT secret lives (created if absent).
    pub jwt_secret_path: PathBuf,
    /// Bounds on the three chain-state block caches.
    pub cache_limits: BlockCacheLimits,
    /// Transaction pool capacity/pricing knobs.
    pub pool_config: PoolConfig,
    /// Beacon engine tuning (ignored in auto-seal mode).
    pub beacon_config: BeaconConsensusEngineConfig,
    /// Auto-seal tuning (ignored in beacon mode).
    pub miner_config: MinerConfig,
}

/// The assembled, not-yet-running node: every long-lived collaborator
/// named in §2's dependency DAG, wired together.
pub struct ExecutionNode {
    pub chain_spec: Arc<ChainSpec>,
    pub chain_store: Arc<ChainStore>,
    pub vm: Arc<VmExecutionEngine<EthExecutionStrategyFactory>>,
    pub pool: Arc<TxPool<EthPooledTransaction, VmStateAccountReader>>,
    pub payload_builder: Arc<PayloadBuilderHandle<EthPooledTransaction, VmStateAccountReader, BasicBlockExecutorProvider<EthExecutionStrategyFactory>>>,
    pub jwt_secret: JwtSecret,
    pub driver: Driver<EthExecutionStrategyFactory>,
}

impl ExecutionNode {
    /// Builds every collaborator and selects the post-merge/pre-merge
    /// driver, without starting anything (§2's wiring step; nothing
    /// here spawns a task).
    pub fn build(config: NodeConfig) -> std::io::Result<Self> {
        let NodeConfig { chain_spec, jwt_secret_path, cache_limits, pool_config, beacon_config, miner_config } =
            config;

        let genesis = Block {
            header: chain_spec.genesis_header(),
            body: BlockBody::default(),
        }
        .seal_slow();

        let chain_store = Arc::new(ChainStore::new(genesis, cache_limits));

        let strategy_factory = EthExecutionStrategyFactory::new(chain_spec.clone());
        let vm = Arc::new(VmExecutionEngine::new(
            chain_store.clone(),
            chain_spec.clone(),
            strategy_factory.clone(),
            VmExecutionEngineConfig::default(),
        ));
        vm.open().map_err(|err| std::io::Error::other(err.to_string()))?;

        let account_reader = Arc::new(VmStateAccountReader::new(vm.state_handle(), chain_store.clone()));
        let pool = Arc::new(TxPool::new(chain_spec.clone(), account_reader, pool_config));

        let executor_provider = Arc::new(BasicBlockExecutorProvider::new(strategy_factory.clone()));
        let payload_builder = Arc::new(PayloadBuilderHandle::new(
            chain_spec.clone(),
            executor_provider.clone(),
            Arc::new(vm.state_handle()),
            pool.clone(),
        ));

        let jwt_secret = load_jwt_secret(&jwt_secret_path)?;

        let is_post_merge =
            chain_spec.is_fork_active_at(execution_ethereum_forks::Hardfork::Paris, 0, chain_spec.genesis.timestamp);

        let driver = if is_post_merge {
            let engine = Arc::new(BeaconConsensusEngine::new(
                chain_store.clone(),
                vm.clone(),
                pool.clone(),
                payload_builder.clone(),
                beacon_config,
            ));
            let api = Arc::new(EngineApi::new(
                chain_spec.clone(),
                chain_store.clone(),
                vm.clone(),
                engine.clone(),
                payload_builder.clone(),
                jwt_secret.clone(),
            ));
            info!(target: "node", chain = %chain_spec.chain, "Paris active at genesis, running the beacon engine");
            Driver::Beacon { engine, api }
        } else {
            info!(target: "node", chain = %chain_spec.chain, "Paris not active at genesis, running the auto-seal miner");
            let miner = Arc::new(Miner::new(
                chain_spec.clone(),
                chain_store.clone(),
                vm.clone(),
                executor_provider,
                pool.clone(),
                InstantSeal,
                miner_config,
            ));
            Driver::AutoSeal(miner)
        };

        Ok(Self { chain_spec, chain_store, vm, pool, payload_builder, jwt_secret, driver })
    }

    /// Starts whichever driver this node selected. Returns join handles
    /// a caller can await on shutdown; a beacon-driven node additionally
    /// exposes its [`EngineApi`] surface for a (not-implemented-here)
    /// JSON-RPC layer to dispatch to.
    pub fn run(&self) -> RunningNode {
        match &self.driver {
            Driver::Beacon { engine, api } => {
                let (handle, join) = engine.clone().spawn();
                RunningNode::Beacon { handle, join, api: api.clone() }
            }
            Driver::AutoSeal(miner) => {
                let (handle, join) = miner.clone().spawn();
                RunningNode::AutoSeal { handle, join }
            }
        }
    }
}

/// A started node's handles (§5: "threads/channels for coarse work").
pub enum RunningNode {
    Beacon {
        handle: execution_consensus_beacon::BeaconConsensusEngineHandle,
        join: JoinHandle<()>,
        api: Arc<EngineApi<EthExecutionStrategyFactory, EthPooledTransaction, VmStateAccountReader>>,
    },
    AutoSeal {
        handle: MinerHandle,
        join: JoinHandle<()>,
    },
}

impl RunningNode {
    /// Requests a graceful stop and waits for the driver's background
    /// task to exit. §9: an in-flight block is allowed to finish rather
    /// than being torn down mid-execution.
    ///
    /// For the beacon driver, shutdown is "drop the handle": the
    /// engine's message loop reads from the channel until every sender
    /// is gone, so dropping `handle` (by consuming `self`) is what
    /// stops it; there's no separate stop signal to send.
    pub async fn shutdown(self) {
        match self {
            Self::Beacon { handle, join, api: _ } => {
                drop(handle);
                let _ = join.await;
            }
            Self::AutoSeal { handle, join } => {
                handle.stop();
                let _ = join.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_chainspec::DEV;

    fn test_config(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            chain_spec: Arc::new(DEV.clone()),
            jwt_secret_path: dir.join("jwt.hex"),
            cache_limits: BlockCacheLimits::default(),
            pool_config: PoolConfig::default(),
            beacon_config: BeaconConsensusEngineConfig::default(),
            miner_config: MinerConfig::default(),
        }
    }

    #[test]
    fn dev_chain_spec_selects_the_beacon_driver() {
        let dir = std::env::temp_dir().join("execution-core-node-test-dev");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let node = ExecutionNode::build(test_config(&dir)).unwrap();
        assert!(matches!(node.driver, Driver::Beacon { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mainnet_chain_spec_selects_the_auto_seal_driver() {
        let dir = std::env::temp_dir().join("execution-core-node-test-mainnet");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut config = test_config(&dir);
        config.chain_spec = Arc::new(execution_chainspec::MAINNET.clone());

        let node = ExecutionNode::build(config).unwrap();
        assert!(matches!(node.driver, Driver::AutoSeal(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
