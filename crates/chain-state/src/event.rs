use alloy_primitives::B256;
use execution_primitives::SealedBlock;

/// Events published on the chain-wide broadcast bus (§5 "Ordering
/// guarantees", §9 "prefer channel-based decoupling").
///
/// Components subscribe to this instead of holding direct references to
/// each other, resolving the cyclic Chain/Synchronizer/TxPool/VMExecution
/// graph the source exhibited (§9).
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// The canonical head advanced without displacing any prior
    /// canonical block. Emitted in the same order as the head advances,
    /// after all per-block writes complete (§5).
    ChainUpdated {
        /// Newly canonical blocks, in ascending order.
        new: Vec<SealedBlock>,
    },
    /// A reorg: `old` is fully materialized before `new` is applied, and
    /// both are delivered together before any downstream handler
    /// observes the new canonical head (§5).
    ChainReorg {
        /// Blocks that were canonical and no longer are, in ascending
        /// order.
        old: Vec<SealedBlock>,
        /// Their replacement, in ascending order.
        new: Vec<SealedBlock>,
    },
    /// The VM execution engine failed to execute a submitted block
    /// (§4.2, `SYNC_EXECUTION_VM_ERROR`).
    ExecutionVmError {
        /// The block that failed to execute.
        block_hash: B256,
        /// Human-readable description of the failure.
        message: String,
    },
    /// A transient sync-layer failure (§7 "Transient").
    SyncError {
        /// Human-readable context.
        message: String,
    },
    /// A permanent protocol-layer failure (§7 "Permanent validation").
    ProtocolError {
        /// Human-readable context.
        message: String,
    },
}
