use execution_primitives::SealedBlock;
use execution_storage_errors::ProviderError;

/// The three named iterator heads the chain store maintains (§3 "Chain
/// status"): the latest executed block, and the beacon-declared safe and
/// finalized tips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorHead {
    /// Latest block whose state has been executed and committed.
    Vm,
    /// Beacon-safe tip.
    Safe,
    /// Beacon-finalized tip.
    Finalized,
}

/// The delta a canonical-chain mutation produces, used to build the
/// `ChainUpdated`/`ChainReorg` events the chain store emits (§4.1
/// `putBlocks`).
#[derive(Debug, Clone)]
pub enum CanonStateNotification {
    /// The canonical head advanced without displacing any prior
    /// canonical block.
    Updated { new: Vec<SealedBlock> },
    /// A reorg: `old` is the set of blocks that were canonical and no
    /// longer are; `new` is their replacement, in ascending order.
    Reorg { old: Vec<SealedBlock>, new: Vec<SealedBlock> },
}

/// The read/write surface over the chain store's three iterator heads
/// and the canonical-head pointer (§4.1 `setIteratorHead`,
/// `getCanonicalHeadBlock`, ...).
#[auto_impl::auto_impl(&, Arc)]
pub trait CanonStateTracker: Send + Sync {
    /// The current canonical-head block.
    fn canonical_head(&self) -> Result<SealedBlock, ProviderError>;

    /// The block currently pointed to by the given iterator head.
    fn iterator_head(&self, which: IteratorHead) -> Result<Option<SealedBlock>, ProviderError>;

    /// Moves the named iterator head to `hash`.
    ///
    /// Fails with [`ProviderError::UnknownBlockHash`] if `hash` is not a
    /// known block.
    fn set_iterator_head(
        &self,
        which: IteratorHead,
        hash: alloy_primitives::B256,
    ) -> Result<(), ProviderError>;
}
