//! Consensus validation trait boundary (§4.1, §4.2 step 6, §7).
//!
//! A [`Consensus`] implementation is consulted at two points during block
//! ingestion: before execution, to reject structurally invalid headers and
//! bodies outright, and after execution, to check the execution-dependent
//! fields (state root, receipts root, gas used, bloom, requests hash) that
//! only the VM execution engine can compute.

use alloy_primitives::{BlockHash, BlockNumber, B256, U256};
use execution_primitives::{BlockBody, Header, SealedBlock, SealedHeader};
use thiserror::Error;

/// A structural or execution-dependent validation failure (§7 "Permanent
/// validation").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Header gas used exceeds its own gas limit.
    #[error("gas used {gas_used} exceeds gas limit {gas_limit}")]
    GasUsedExceedsGasLimit {
        /// Declared gas used.
        gas_used: u64,
        /// Declared gas limit.
        gas_limit: u64,
    },
    /// The transactions root committed in the header does not match the
    /// root computed from the body's transaction list.
    #[error("body transaction root {got} does not match header {expected}")]
    BodyTransactionRootDiff {
        /// Root computed from the body.
        got: B256,
        /// Root declared in the header.
        expected: B256,
    },
    /// The withdrawals root committed in the header does not match the
    /// root computed from the body's withdrawal list.
    #[error("body withdrawals root {got} does not match header {expected}")]
    BodyWithdrawalsRootDiff {
        /// Root computed from the body.
        got: B256,
        /// Root declared in the header.
        expected: B256,
    },
    /// A withdrawals list was present on a block from before Shanghai, or
    /// absent on a block from Shanghai onward.
    #[error("withdrawals present/absent does not match the active hardfork")]
    WithdrawalsMismatch,
    /// A non-empty ommers list on a block from after the merge.
    #[error("non-empty ommers list on a post-merge block")]
    OmmersNotEmpty,
    /// `block.parentHash != parent.hash()`.
    #[error("parent hash mismatch: block declares {declared}, parent is {actual}")]
    ParentHashMismatch {
        /// Hash the child block declares as its parent.
        declared: BlockHash,
        /// The actual hash of the claimed parent.
        actual: BlockHash,
    },
    /// `block.number != parent.number + 1`.
    #[error("block number {number} does not follow parent number {parent_number}")]
    ParentBlockNumberMismatch {
        /// Declared parent number.
        parent_number: BlockNumber,
        /// Declared block number.
        number: BlockNumber,
    },
    /// `block.timestamp <= parent.timestamp`.
    #[error("timestamp {timestamp} is not greater than parent timestamp {parent_timestamp}")]
    TimestampIsInPast {
        /// Parent timestamp.
        parent_timestamp: u64,
        /// Declared timestamp.
        timestamp: u64,
    },
    /// The computed EIP-1559 base fee does not match the header's.
    #[error("base fee {got} does not match expected {expected}")]
    BaseFeeDiff {
        /// Computed value.
        got: u64,
        /// Header's declared value.
        expected: u64,
    },
    /// Total difficulty overflowed `U256`.
    #[error("total difficulty overflow summing {parent_td} and {difficulty}")]
    DifficultyOverflow {
        /// Parent's total difficulty.
        parent_td: U256,
        /// This block's own difficulty.
        difficulty: U256,
    },
    /// A post-London header has no `baseFeePerGas`.
    #[error("block {number} is post-London but has no base fee")]
    MissingBaseFee {
        /// The offending block's number.
        number: BlockNumber,
    },
    /// An execution-dependent field (receipts root, bloom, gas used,
    /// requests hash) did not match the header, as determined by the VM
    /// execution engine (§4.2 step 6).
    #[error(transparent)]
    Execution(#[from] execution_execution_errors::BlockValidationError),
}

/// Validates headers and bodies both before and after execution.
///
/// Implementations are pure functions of chain configuration and do not
/// themselves touch the chain store; callers supply whatever ancestor data
/// a check needs.
#[auto_impl::auto_impl(&, Arc)]
pub trait Consensus: Send + Sync {
    /// Structural checks on a header alone: gas used vs. limit, extra data
    /// length, and any hardfork-gated field presence/absence.
    fn validate_header(&self, header: &SealedHeader) -> Result<(), ConsensusError>;

    /// Checks a header against its immediate parent: hash linkage, number
    /// sequencing, timestamp monotonicity, base fee, and difficulty/TD
    /// bookkeeping.
    fn validate_header_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ConsensusError>;

    /// Checks a body against its header before execution: transactions
    /// root, withdrawals root, ommers emptiness post-merge.
    fn validate_block_pre_execution(&self, block: &SealedBlock) -> Result<(), ConsensusError>;

    /// Checks execution-dependent fields after the VM has replayed the
    /// block: receipts root, logs bloom, gas used, requests hash. `header`
    /// is re-supplied because post-execution validation never has access
    /// to more than the already-sealed header and the VM's own outputs.
    fn validate_block_post_execution(
        &self,
        header: &Header,
        body: &BlockBody,
        receipts_root: B256,
        logs_bloom: alloy_primitives::Bloom,
        gas_used: u64,
        requests_hash: Option<B256>,
    ) -> Result<(), ConsensusError>;
}
