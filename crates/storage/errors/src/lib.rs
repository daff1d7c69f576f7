//! Errors returned by the chain store's persistence boundary (§4.1
//! "Failure modes").

use alloy_primitives::{BlockHash, BlockNumber, B256};
use thiserror::Error;

/// Failure modes a [`execution_storage_api::ChainStore`] implementation
/// can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Header/body linkage didn't match (`block.parentHash != prev.hash`
    /// or `block.number != prev.number + 1`).
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// The underlying key-value store reported an I/O or corruption
    /// error. Treated as fatal per §7 ("Fatal system").
    #[error("database error: {0}")]
    Database(String),

    /// A required ancestor's state or header could not be found.
    #[error("state not found for block {hash} (number {number})")]
    StateNotFound { hash: BlockHash, number: BlockNumber },

    /// `setIteratorHead` was called with a hash not present in the
    /// store.
    #[error("unknown block hash: {0}")]
    UnknownBlockHash(B256),

    /// A write would have broken canonical-index contiguity.
    #[error("non-contiguous canonical write at block {0}")]
    NonContiguousWrite(BlockNumber),

    /// `delBlock` was asked to remove a block that is part of the
    /// canonical chain.
    #[error("cannot delete canonical block {0}")]
    CannotDeleteCanonicalBlock(BlockHash),
}

impl ProviderError {
    /// Whether this error represents unrecoverable corruption rather
    /// than a rejected write, per §7's "Fatal system" vs. "Permanent
    /// validation" distinction.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
