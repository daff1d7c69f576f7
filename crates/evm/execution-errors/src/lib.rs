//! Block validation and execution error taxonomy (§4.2, §7).
//!
//! Structurally ported from the teacher's `reth-interfaces::executor`
//! module, generalized away from the parallel-executor and pruning
//! variants that don't apply to this core's single-mutex execution model
//! (§4.2, §5).

use alloy_primitives::{BlockNumber, Bloom, B256};
use execution_storage_errors::ProviderError;
use revm_primitives::EVMError;
use thiserror::Error;

/// Errors observed while validating or replaying a single block's
/// transactions (§4.2 "Algorithm — single-block execution").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockValidationError {
    /// The EVM itself rejected a transaction (bad signature, insufficient
    /// balance, nonce mismatch, ...).
    #[error("EVM reported invalid transaction ({hash}): {error}")]
    EVM {
        /// Hash of the offending transaction.
        hash: B256,
        /// The underlying EVM error.
        #[source]
        error: Box<EVMError<String>>,
    },
    /// A transaction's signature did not recover to a valid sender.
    #[error("failed to recover sender for transaction")]
    SenderRecoveryError,
    /// A post-block system balance increment (withdrawals, block reward)
    /// failed to apply.
    #[error("incrementing balance in post execution failed")]
    IncrementBalanceFailed,
    /// The computed receipts root did not match the header's.
    #[error("receipt root {got} is different than expected {expected}")]
    ReceiptRootDiff {
        /// The computed root.
        got: Box<B256>,
        /// The header's declared root.
        expected: Box<B256>,
    },
    /// The computed logs bloom did not match the header's.
    #[error("header bloom filter {got} is different than expected {expected}")]
    BloomLogDiff {
        /// The computed bloom.
        got: Box<Bloom>,
        /// The header's declared bloom.
        expected: Box<Bloom>,
    },
    /// A single transaction's gas limit exceeded the block's remaining
    /// gas.
    #[error(
        "transaction gas limit {transaction_gas_limit} is more than blocks available gas {block_available_gas}"
    )]
    TransactionGasLimitMoreThanAvailableBlockGas {
        /// The transaction's declared gas limit.
        transaction_gas_limit: u64,
        /// The block's remaining gas budget.
        block_available_gas: u64,
    },
    /// The computed total gas used did not match the header's `gasUsed`.
    #[error(
        "block gas used {got} is different from expected gas used {expected}.\n\
         Gas spent by each transaction: {gas_spent_by_tx:?}"
    )]
    BlockGasUsed {
        /// Computed gas used.
        got: u64,
        /// Header's declared gas used.
        expected: u64,
        /// `(transaction_index, gas_used)` for every transaction, for
        /// diagnosing which transaction diverged.
        gas_spent_by_tx: Vec<(u64, u64)>,
    },
    /// Total difficulty was required (pre-merge block reward
    /// computation) but not found in the chain store.
    #[error("missing total difficulty for block {hash}")]
    MissingTotalDifficulty {
        /// Hash of the block.
        hash: B256,
    },
    /// EIP-4788: Cancun-active block with no `parentBeaconBlockRoot`.
    #[error("EIP-4788 parent beacon block root missing for active Cancun block")]
    MissingParentBeaconBlockRoot,
    /// EIP-4788: the Cancun genesis block's beacon root must be zero.
    #[error(
        "the parent beacon block root is not zero for Cancun genesis block: {parent_beacon_block_root}"
    )]
    CancunGenesisParentBeaconBlockRootNotZero {
        /// The non-zero root that was present.
        parent_beacon_block_root: B256,
    },
    /// The EIP-4788 beacon-root system contract call failed.
    #[error("failed to apply beacon root contract call at {parent_beacon_block_root}: {message}")]
    BeaconRootContractCall {
        /// The beacon block root that was being stored.
        parent_beacon_block_root: Box<B256>,
        /// The underlying error message.
        message: String,
    },
    /// The computed EIP-7685 requests hash did not match the header's.
    #[error("requests hash {got} is different than expected {expected}")]
    RequestsHashDiff {
        /// Computed hash.
        got: Box<B256>,
        /// Header's declared hash.
        expected: Box<B256>,
    },
    /// The computed state root did not match the header's `stateRoot`.
    #[error("state root {got} is different than expected {expected} for block {block_number}")]
    StateRootDiff {
        /// Computed root.
        got: Box<B256>,
        /// Header's declared root.
        expected: Box<B256>,
        /// Number of the offending block.
        block_number: BlockNumber,
    },
}

/// Errors the VM execution engine can report while replaying a block
/// (§4.2, §7 "Permanent validation" / "Fatal system").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockExecutionError {
    /// A validation failure, as enumerated in [`BlockValidationError`].
    #[error(transparent)]
    Validation(#[from] BlockValidationError),
    /// A failure surfaced by the chain store.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Committing a state transition failed. Treated as fatal (§7).
    #[error("transaction error on commit: {inner}")]
    CanonicalCommit {
        /// Underlying error message.
        inner: String,
    },
    /// Reverting a state transition failed. Treated as fatal (§7).
    #[error("transaction error on revert: {inner}")]
    CanonicalRevert {
        /// Underlying error message.
        inner: String,
    },
    /// `runWithoutSetHead` was called with a state root the state
    /// manager does not have (§4.2).
    #[error("missing parent state root {0}")]
    MissingParentState(B256),
}

impl BlockExecutionError {
    /// Whether this error is unrecoverable database corruption rather
    /// than a rejected block (§7 "Fatal system" vs. "Permanent
    /// validation").
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CanonicalCommit { .. } | Self::CanonicalRevert { .. })
    }

    /// Whether this error should cause the offending block to be cached
    /// in *invalidBlocks* (§3, §7), i.e. it is a permanent validation
    /// failure rather than a transient/fatal one.
    pub const fn is_permanent_validation_failure(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
