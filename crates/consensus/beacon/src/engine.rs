//! `BeaconConsensusEngine` (§4.5/§4.6, §9): the core `newPayload`/
//! `forkchoiceUpdated` algorithm, driven either by direct calls or by a
//! `tokio::sync::mpsc` message channel.
//!
//! Version gating, JWT authentication and wire-type conversion are not
//! this crate's concern — those live in `execution-engine-api`, which
//! calls into [`BeaconConsensusEngine::on_new_payload`]/
//! [`BeaconConsensusEngine::on_forkchoice_updated`] once a request has
//! already been validated and converted to a [`SealedBlock`]. This
//! split mirrors the teacher's own layering: `reth-beacon-consensus`
//! owns the engine; `reth-rpc-engine-api` is the thin JSON-RPC-facing
//! wrapper around it.

use std::sync::Arc;

use alloy_consensus::Transaction as _;
use alloy_primitives::{B256, U256};
use execution_chain_state::ChainStore;
use execution_engine_primitives::{payload_status, ForkchoiceState, PayloadId, PayloadStatus};
use execution_evm::execute::{BasicBlockExecutorProvider, BlockExecutionStrategyFactory};
use execution_payload_builder::PayloadBuilderHandle;
use execution_payload_primitives::PayloadBuilderAttributes;
use execution_primitives::SealedBlock;
use execution_revm::VmExecutionEngine;
use execution_storage_api::{BlockProvider, HeaderProvider};
use execution_transaction_pool::{PoolAccountReader, PoolTransaction, TxPool};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::skeleton::Skeleton;

/// Tuning knobs for the bounded ancestor walk `newPayload`/
/// `forkchoiceUpdated` perform before executing a block whose parent
/// isn't the current `vm` head (§4.6 steps 4-6).
#[derive(Debug, Clone, Copy)]
pub struct BeaconConsensusEngineConfig {
    /// `engineNewpayloadMaxExecute`: max ancestors executed in one call
    /// before giving up and reporting `SYNCING`.
    pub max_execute_ancestors: usize,
    /// `engineNewpayloadMaxTxsExecute`: max transactions in a single
    /// block this engine will execute inline rather than defer.
    pub max_txs_execute: usize,
    /// Depth cap for `recursivelyFindParents` (§4.6 step 5).
    pub max_backtrack_depth: usize,
    /// Header cache capacity for the skeleton (§4.5).
    pub skeleton_header_cache_capacity: u32,
}

impl Default for BeaconConsensusEngineConfig {
    fn default() -> Self {
        Self {
            max_execute_ancestors: 32,
            max_txs_execute: 500,
            max_backtrack_depth: 64,
            skeleton_header_cache_capacity: crate::skeleton::DEFAULT_HEADER_CACHE_CAPACITY,
        }
    }
}

/// `{payloadStatus, payloadId?}` (§4.6 `forkchoiceUpdated` return value).
#[derive(Debug, Clone)]
pub struct ForkchoiceOutcome {
    /// The resulting payload status.
    pub status: PayloadStatus,
    /// The id of the payload build started, if attributes were supplied
    /// and the forkchoice update was accepted.
    pub payload_id: Option<PayloadId>,
}

/// Messages the engine's message-driven `spawn` loop accepts (§9:
/// "tagged-variant messages over type erasure").
pub enum BeaconEngineMessage {
    /// `engine_newPayload*` (already version-validated and converted to
    /// a block by the caller).
    NewPayload { block: Box<SealedBlock>, reply: oneshot::Sender<PayloadStatus> },
    /// `engine_forkchoiceUpdated*`.
    ForkchoiceUpdated {
        state: ForkchoiceState,
        attributes: Option<PayloadBuilderAttributes>,
        reply: oneshot::Sender<ForkchoiceOutcome>,
    },
}

/// A cloneable handle to a running [`BeaconConsensusEngine`], talking to
/// it over its message channel rather than calling it directly.
#[derive(Clone)]
pub struct BeaconConsensusEngineHandle {
    sender: mpsc::UnboundedSender<BeaconEngineMessage>,
}

impl BeaconConsensusEngineHandle {
    /// `engine_newPayload*` over the channel.
    pub async fn new_payload(&self, block: SealedBlock) -> PayloadStatus {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(BeaconEngineMessage::NewPayload { block: Box::new(block), reply })
            .is_err()
        {
            return payload_status::syncing();
        }
        rx.await.unwrap_or_else(|_| payload_status::syncing())
    }

    /// `engine_forkchoiceUpdated*` over the channel.
    pub async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadBuilderAttributes>,
    ) -> ForkchoiceOutcome {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(BeaconEngineMessage::ForkchoiceUpdated { state, attributes, reply })
            .is_err()
        {
            return ForkchoiceOutcome { status: payload_status::syncing(), payload_id: None };
        }
        rx.await.unwrap_or(ForkchoiceOutcome { status: payload_status::syncing(), payload_id: None })
    }
}

/// Drives `newPayload`/`forkchoiceUpdated` against the chain store, VM
/// execution engine, transaction pool and payload builder (§4.5, §4.6).
pub struct BeaconConsensusEngine<F, T, A>
where
    F: BlockExecutionStrategyFactory,
    T: PoolTransaction,
    A: PoolAccountReader,
{
    chain_store: Arc<ChainStore>,
    vm: Arc<VmExecutionEngine<F>>,
    pool: Arc<TxPool<T, A>>,
    payload_builder: Arc<PayloadBuilderHandle<T, A, BasicBlockExecutorProvider<F>>>,
    skeleton: Mutex<Skeleton>,
    config: BeaconConsensusEngineConfig,
}

impl<F, T, A> BeaconConsensusEngine<F, T, A>
where
    F: BlockExecutionStrategyFactory,
    T: PoolTransaction,
    A: PoolAccountReader,
{
    /// Builds an engine over the given collaborators.
    pub fn new(
        chain_store: Arc<ChainStore>,
        vm: Arc<VmExecutionEngine<F>>,
        pool: Arc<TxPool<T, A>>,
        payload_builder: Arc<PayloadBuilderHandle<T, A, BasicBlockExecutorProvider<F>>>,
        config: BeaconConsensusEngineConfig,
    ) -> Self {
        Self {
            chain_store,
            vm,
            pool,
            payload_builder,
            skeleton: Mutex::new(Skeleton::new(config.skeleton_header_cache_capacity)),
            config,
        }
    }

    /// Spawns the engine's message loop on the current Tokio runtime,
    /// returning a cloneable handle plus the task's join handle.
    pub fn spawn(self: Arc<Self>) -> (BeaconConsensusEngineHandle, tokio::task::JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let engine = self;
        let join = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    BeaconEngineMessage::NewPayload { block, reply } => {
                        let status = engine.on_new_payload(*block);
                        let _ = reply.send(status);
                    }
                    BeaconEngineMessage::ForkchoiceUpdated { state, attributes, reply } => {
                        let outcome = engine.on_forkchoice_updated(state, attributes);
                        let _ = reply.send(outcome);
                    }
                }
            }
        });
        (BeaconConsensusEngineHandle { sender }, join)
    }

    /// `engine_newPayload*` core algorithm (§4.6 steps 1, 4-7; steps 2-3
    /// — block-hash and 4844-invariant checks — are the caller's job,
    /// since they happen before a [`SealedBlock`] even exists).
    pub fn on_new_payload(&self, block: SealedBlock) -> PayloadStatus {
        let hash = block.hash();

        if let Some(message) = self.chain_store.invalid_blocks().peek(&hash) {
            return payload_status::invalid(message, self.valid_ancestor(block.parent_hash()));
        }

        let Some(ancestors) = self.recursively_find_parents(&block) else {
            self.chain_store.remote_blocks().insert(hash, block.clone());
            let accepted = self.skeleton.lock().set_head(block.header.clone(), false);
            return if accepted { payload_status::syncing() } else { payload_status::accepted() };
        };

        if ancestors.len() > self.config.max_execute_ancestors {
            return payload_status::syncing();
        }

        for ancestor in &ancestors {
            if ancestor.body.transactions.len() > self.config.max_txs_execute {
                return payload_status::accepted();
            }
            if self.chain_store.executed_blocks().contains(&ancestor.hash()) {
                continue;
            }
            if let Err(err) = self.vm.run_without_set_head(ancestor, U256::ZERO, None, true, false) {
                return payload_status::invalid(err.to_string(), self.valid_ancestor(ancestor.parent_hash()));
            }
            self.chain_store.executed_blocks().insert(ancestor.hash(), ancestor.clone());
        }

        if block.body.transactions.len() > self.config.max_txs_execute {
            return payload_status::accepted();
        }

        match self.vm.run_without_set_head(&block, U256::ZERO, None, true, false) {
            Ok(_) => {
                self.chain_store.executed_blocks().insert(hash, block);
                payload_status::valid(hash)
            }
            Err(err) => {
                let _ = self.chain_store.del_block(hash);
                self.skeleton.lock().delete_block(hash);
                payload_status::invalid(err.to_string(), self.valid_ancestor(block.parent_hash()))
            }
        }
    }

    /// `engine_forkchoiceUpdated*` core algorithm (§4.6): resolves the
    /// requested head, executes any ancestors the `vm` hasn't caught up
    /// to, advances `setHead`, signals the pool, and optionally starts a
    /// payload build. Forkchoice-state self-consistency (step 1) and
    /// version gating are the caller's job.
    pub fn on_forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadBuilderAttributes>,
    ) -> ForkchoiceOutcome {
        // `forkchoiceUpdated` only carries hashes, not headers — unlike
        // `newPayload`, there's nothing to register with the skeleton
        // until a body for this hash actually arrives (e.g. via a later
        // `newPayload` call).
        let Some(head) = self.resolve_block(state.head_block_hash) else {
            return ForkchoiceOutcome { status: payload_status::syncing(), payload_id: None };
        };

        {
            let mut skeleton = self.skeleton.lock();
            skeleton.forkchoice_update(head.header.clone(), state.safe_block_hash, state.finalized_block_hash);
        }

        if self.vm.status().hash != head.hash() {
            let Some(ancestors) = self.recursively_find_parents(&head) else {
                return ForkchoiceOutcome { status: payload_status::syncing(), payload_id: None };
            };

            let mut chain = ancestors;
            chain.push(head.clone());

            for block in &chain {
                if block.hash() == self.vm.status().hash {
                    continue;
                }
                if self.chain_store.executed_blocks().contains(&block.hash()) {
                    continue;
                }
                if let Err(err) = self.vm.run_without_set_head(block, U256::ZERO, None, true, false) {
                    return ForkchoiceOutcome {
                        status: payload_status::invalid(
                            err.to_string(),
                            self.valid_ancestor(block.parent_hash()),
                        ),
                        payload_id: None,
                    };
                }
                self.chain_store.executed_blocks().insert(block.hash(), block.clone());
            }

            let safe = (state.safe_block_hash != B256::ZERO).then_some(state.safe_block_hash);
            let finalized = (state.finalized_block_hash != B256::ZERO).then_some(state.finalized_block_hash);
            if let Err(err) = self.vm.set_head(chain, safe, finalized) {
                return ForkchoiceOutcome {
                    status: payload_status::invalid(err.to_string(), self.valid_ancestor(head.parent_hash())),
                    payload_id: None,
                };
            }
        }

        self.pool.remove_mined(head.body.transactions.iter().map(|tx| *tx.tx_hash()));
        self.pool.promote_executables();

        let payload_id = match attributes {
            Some(attrs) if attrs.attributes.timestamp > head.header.timestamp => {
                self.payload_builder.start(&head.header, attrs).ok()
            }
            _ => None,
        };

        ForkchoiceOutcome { status: payload_status::valid(head.hash()), payload_id }
    }

    /// Displaced-block reorg handling (§4.3 "reorg"): reconstructs every
    /// transaction that left the canonical chain and hands it back to
    /// the pool for re-injection, then lets the pool re-validate its
    /// senders against the new head.
    pub fn handle_reorg(&self, old_blocks: &[SealedBlock], new_blocks: &[SealedBlock]) {
        use execution_primitives::TransactionSignedEcRecovered;

        let still_included: std::collections::HashSet<_> =
            new_blocks.iter().flat_map(|b| b.body.transactions.iter().map(|tx| *tx.tx_hash())).collect();

        for block in old_blocks {
            let Some(senders) = block.senders() else { continue };
            for (tx, sender) in block.body.transactions.iter().zip(senders) {
                if still_included.contains(tx.tx_hash()) {
                    continue;
                }
                let recovered = TransactionSignedEcRecovered::from_signed_transaction(tx.clone(), sender);
                self.pool.reinject(T::from_consensus(recovered));
            }
        }

        self.pool.handle_reorg(old_blocks, new_blocks);
    }

    /// `getBlockByHash` (§4.5): the chain store first, falling back to a
    /// block parked in the skeleton's remote-block cache.
    fn resolve_block(&self, hash: B256) -> Option<SealedBlock> {
        if let Ok(Some(block)) = self.chain_store.block(hash) {
            return Some(block);
        }
        self.chain_store.remote_blocks().get(&hash)
    }

    /// `recursivelyFindParents` (§4.6 step 5): walks ancestors of
    /// `block` back to the current `vm` head, oldest first. `None` if
    /// the walk runs past [`BeaconConsensusEngineConfig::max_backtrack_depth`]
    /// or hits a parent the chain store doesn't have.
    fn recursively_find_parents(&self, block: &SealedBlock) -> Option<Vec<SealedBlock>> {
        let vm_hash = self.vm.status().hash;
        if block.parent_hash() == vm_hash {
            return Some(Vec::new());
        }

        let mut chain = Vec::new();
        let mut current = self.resolve_block(block.parent_hash())?;

        loop {
            if current.hash() == vm_hash {
                break;
            }
            if chain.len() >= self.config.max_backtrack_depth {
                return None;
            }
            let parent_hash = current.parent_hash();
            chain.push(current);
            if parent_hash == vm_hash {
                break;
            }
            current = self.resolve_block(parent_hash)?;
        }

        chain.reverse();
        Some(chain)
    }

    /// "The deepest canonical ancestor whose state is known valid, or
    /// 32 zero bytes if none" (§4.6/§7, `latestValidHash`).
    fn valid_ancestor(&self, mut hash: B256) -> B256 {
        for _ in 0..self.config.max_backtrack_depth {
            if hash == B256::ZERO {
                return B256::ZERO;
            }
            if self.chain_store.invalid_blocks().contains(&hash) {
                match self.chain_store.header(&hash) {
                    Ok(Some(header)) => {
                        hash = header.parent_hash;
                        continue;
                    }
                    _ => return B256::ZERO,
                }
            }
            return match self.chain_store.header(&hash) {
                Ok(Some(_)) => hash,
                _ => B256::ZERO,
            };
        }
        B256::ZERO
    }
}
