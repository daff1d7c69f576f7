use std::collections::HashMap;

use alloy_primitives::{B256, U256};
use execution_primitives::{Request, SealedBlock};
use revm::db::BundleState;

/// The input to a single block's execution: the block itself, its total
/// difficulty (needed for the pre-merge block reward), and any ancestor
/// headers the VM might need to resolve a `BLOCKHASH` lookup that misses
/// the chain store's canonical index (e.g. during a reorg replay).
#[derive(Debug)]
pub struct BlockExecutionInput<'a> {
    /// The block to execute.
    pub block: &'a SealedBlock,
    /// Total difficulty up to and including this block.
    pub total_difficulty: U256,
    /// Ancestor headers keyed by hash, consulted for `BLOCKHASH` opcodes
    /// reaching outside the canonical chain (e.g. while replaying a
    /// side branch not yet canonical).
    pub ancestor_headers: Option<&'a HashMap<B256, execution_primitives::Header>>,
}

impl<'a> BlockExecutionInput<'a> {
    /// Creates a new input.
    pub const fn new(
        block: &'a SealedBlock,
        total_difficulty: U256,
        ancestor_headers: Option<&'a HashMap<B256, execution_primitives::Header>>,
    ) -> Self {
        Self { block, total_difficulty, ancestor_headers }
    }
}

impl<'a> From<(&'a SealedBlock, U256)> for BlockExecutionInput<'a> {
    fn from((block, total_difficulty): (&'a SealedBlock, U256)) -> Self {
        Self::new(block, total_difficulty, None)
    }
}

/// The output of executing a single block (§4.2 step 4-7): the resulting
/// state changes, one receipt per transaction, any EIP-7685 requests
/// extracted post-block, and the total gas used — everything the VM
/// execution engine needs to validate against the header and, if valid,
/// persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExecutionOutput<T> {
    /// The state diff produced by replaying the block.
    pub state: BundleState,
    /// One receipt per transaction, in order.
    pub receipts: Vec<T>,
    /// EIP-7685 requests extracted from system-contract logs
    /// post-execution (Prague onward).
    pub requests: Vec<Request>,
    /// Sum of gas used by every transaction in the block.
    pub gas_used: u64,
}
