use alloy_primitives::{BlockHash, BlockNumber};
use execution_primitives::Header;
use execution_storage_errors::ProviderError;

/// Reads headers by hash or canonical number (§4.1 `getHeader`).
#[auto_impl::auto_impl(&, Arc)]
pub trait HeaderProvider: Send + Sync {
    /// Looks up a header by its hash.
    fn header(&self, block_hash: &BlockHash) -> Result<Option<Header>, ProviderError>;

    /// Looks up a header by canonical block number.
    fn header_by_number(&self, num: BlockNumber) -> Result<Option<Header>, ProviderError>;

    /// Returns `true` if `block_hash` is known (canonical or not).
    fn is_known(&self, block_hash: &BlockHash) -> Result<bool, ProviderError> {
        Ok(self.header(block_hash)?.is_some())
    }
}
