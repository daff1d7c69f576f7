use alloy_primitives::{BlockHash, BlockNumber};
use execution_primitives::SealedBlock;
use execution_storage_errors::ProviderError;

/// Resolves a block hash to its canonical number, and vice versa.
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockNumReader: Send + Sync {
    /// The canonical number for a given hash, if the hash is canonical.
    fn block_number(&self, hash: BlockHash) -> Result<Option<BlockNumber>, ProviderError>;

    /// The canonical hash for a given number.
    fn block_hash(&self, number: BlockNumber) -> Result<Option<BlockHash>, ProviderError>;

    /// The current canonical chain tip's number.
    fn best_block_number(&self) -> Result<BlockNumber, ProviderError>;
}

/// Resolves block hashes needed by opcodes like `BLOCKHASH`.
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockHashReader: Send + Sync {
    /// The canonical hash at `number`, if any.
    fn block_hash(&self, number: BlockNumber) -> Result<Option<BlockHash>, ProviderError>;

    /// The canonical hashes in `start..end`, in order, stopping early if
    /// a number in the range has no canonical hash.
    fn canonical_hashes_range(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockHash>, ProviderError>;
}

/// Reads full blocks (header + body) by hash or number (§4.1 `getBlock`).
#[auto_impl::auto_impl(&, Arc)]
pub trait BlockProvider: BlockNumReader + Send + Sync {
    /// Looks up a sealed block by its hash.
    fn block(&self, hash: BlockHash) -> Result<Option<SealedBlock>, ProviderError>;

    /// Looks up a sealed block by canonical number.
    fn block_by_number(&self, number: BlockNumber) -> Result<Option<SealedBlock>, ProviderError>;
}
