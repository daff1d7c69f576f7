use alloy_primitives::{BlockHash, BlockNumber};
use execution_primitives::BlobSidecars;
use execution_storage_errors::ProviderError;

/// Fetches blob sidecars by the block that carried them.
///
/// Sidecars are never committed to the header (§3), so they are indexed
/// separately from [`crate::BlockProvider`].
#[auto_impl::auto_impl(&, Arc)]
pub trait SidecarsProvider: Send + Sync {
    /// Looks up sidecars by block hash. Returns `None` if none were
    /// stored for that block.
    fn sidecars(&self, block_hash: &BlockHash) -> Result<Option<BlobSidecars>, ProviderError>;

    /// Looks up sidecars by canonical block number.
    fn sidecars_by_number(&self, num: BlockNumber) -> Result<Option<BlobSidecars>, ProviderError>;
}
