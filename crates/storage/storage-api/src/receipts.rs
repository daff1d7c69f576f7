use alloy_primitives::{BlockHash, BlockNumber, TxHash};
use execution_primitives::Receipts;
use execution_storage_errors::ProviderError;

/// Reads receipts by block, or a single receipt by transaction hash via
/// the tx-index key family (§6 `metaDB`'s `txindex:{txHash}`).
#[auto_impl::auto_impl(&, Arc)]
pub trait ReceiptProvider: Send + Sync {
    /// All receipts produced by the block with the given hash, in
    /// transaction order.
    fn receipts_by_block_hash(&self, hash: BlockHash) -> Result<Option<Receipts>, ProviderError>;

    /// All receipts produced by the block at the given canonical number.
    fn receipts_by_block_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<Receipts>, ProviderError>;

    /// The `(block_hash, transaction_index)` pair a transaction hash was
    /// included at, if known.
    fn transaction_block_location(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<(BlockHash, u64)>, ProviderError>;
}
