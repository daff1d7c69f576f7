use alloy_primitives::{BlockHash, BlockNumber, U256};
use execution_storage_errors::ProviderError;

/// Reads the total difficulty stored for a canonical block (§4.1 `getTd`).
#[auto_impl::auto_impl(&, Arc)]
pub trait TotalDifficultyProvider: Send + Sync {
    /// The total difficulty accumulated up to and including the block
    /// identified by `(hash, number)`.
    fn total_difficulty(
        &self,
        hash: BlockHash,
        number: BlockNumber,
    ) -> Result<Option<U256>, ProviderError>;
}
