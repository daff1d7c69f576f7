use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{BlockHash, BlockNumber, B256, U256};
use execution_primitives::{BlobSidecars, Receipts, SealedBlock};
use execution_storage_api::{
    BlockHashReader, BlockNumReader, BlockProvider, CanonStateTracker, HeaderProvider,
    IteratorHead, ReceiptProvider, SidecarsProvider, TotalDifficultyProvider,
};
use execution_storage_errors::ProviderError;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{cache::BlockCacheLimits, BoundedBlockCache, ChainEvent};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct Inner {
    blocks: HashMap<B256, SealedBlock>,
    receipts: HashMap<B256, Receipts>,
    sidecars: HashMap<B256, BlobSidecars>,
    total_difficulty: HashMap<B256, U256>,
    /// `number -> hash`, the canonical index (§4.1 invariant: always a
    /// contiguous chain from genesis to the canonical-head hash).
    canonical: BTreeMap<BlockNumber, BlockHash>,
    iterator_heads: HashMap<IteratorHeadKey, BlockHash>,
}

/// `IteratorHead` doesn't implement `Hash` by derive in the traits crate
/// (kept minimal there); this local key wrapper lets us use it in a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IteratorHeadKey {
    Vm,
    Safe,
    Finalized,
}

impl From<IteratorHead> for IteratorHeadKey {
    fn from(value: IteratorHead) -> Self {
        match value {
            IteratorHead::Vm => Self::Vm,
            IteratorHead::Safe => Self::Safe,
            IteratorHead::Finalized => Self::Finalized,
        }
    }
}

/// The canonical chain store (§4.1): headers/bodies/receipts/TD, the
/// three iterator heads, and the canonical `number -> hash` index.
///
/// Writes are serialized behind a single `RwLock`; reads take the read
/// lock for a consistent snapshot, matching §5's "chain store serializes
/// writes; reads use snapshot isolation".
pub struct ChainStore {
    inner: RwLock<Inner>,
    remote_blocks: BoundedBlockCache<SealedBlock>,
    executed_blocks: BoundedBlockCache<SealedBlock>,
    invalid_blocks: BoundedBlockCache<String>,
    events: broadcast::Sender<ChainEvent>,
}

impl ChainStore {
    /// Creates an empty chain store rooted at `genesis`.
    pub fn new(genesis: SealedBlock, limits: BlockCacheLimits) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let hash = genesis.hash();

        let mut inner = Inner::default();
        inner.canonical.insert(genesis.number(), hash);
        inner.total_difficulty.insert(hash, genesis.header.difficulty);
        inner.iterator_heads.insert(IteratorHeadKey::Vm, hash);
        inner.iterator_heads.insert(IteratorHeadKey::Safe, hash);
        inner.iterator_heads.insert(IteratorHeadKey::Finalized, hash);
        inner.blocks.insert(hash, genesis);

        Self {
            inner: RwLock::new(inner),
            remote_blocks: BoundedBlockCache::new(limits.remote_blocks),
            executed_blocks: BoundedBlockCache::new(limits.executed_blocks),
            invalid_blocks: BoundedBlockCache::new(limits.invalid_blocks),
            events: events,
        }
    }

    /// Subscribes to the chain event bus (§5, §9 "channel-based
    /// decoupling").
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Publishes an event that does not arise from [`Self::put_blocks`]
    /// itself, e.g. `ExecutionVmError`/`SyncError`/`ProtocolError` raised
    /// by a collaborator that only holds a reference to the chain store
    /// (§5, §7).
    pub fn emit(&self, event: ChainEvent) {
        let _ = self.events.send(event);
    }

    /// The *remoteBlocks* cache: blocks received via `newPayload` but not
    /// yet canonical.
    pub fn remote_blocks(&self) -> &BoundedBlockCache<SealedBlock> {
        &self.remote_blocks
    }

    /// The *executedBlocks* cache: blocks whose state transition
    /// succeeded, pending becoming canonical via forkchoice.
    pub fn executed_blocks(&self) -> &BoundedBlockCache<SealedBlock> {
        &self.executed_blocks
    }

    /// The *invalidBlocks* cache: blocks whose execution failed, keyed
    /// for quick rejection of repeated submissions (§7).
    pub fn invalid_blocks(&self) -> &BoundedBlockCache<String> {
        &self.invalid_blocks
    }

    /// Records receipts produced for an already-stored block (§4.2 step 7
    /// "Persist receipts").
    pub fn put_receipts(&self, block_hash: BlockHash, receipts: Receipts) {
        self.inner.write().receipts.insert(block_hash, receipts);
    }

    /// Records blob sidecars for an already-stored block.
    pub fn put_sidecars(&self, block_hash: BlockHash, sidecars: BlobSidecars) {
        self.inner.write().sidecars.insert(block_hash, sidecars);
    }

    /// `putBlocks(blocks, skipUpdateHead?, skipEmit?)` (§4.1).
    ///
    /// Accepts an ordered list whose first block's parent is already
    /// known. Validates linkage, writes header/body/TD, and — unless
    /// `skip_update_head` — advances the canonical index, detecting a
    /// reorg (a number that already had a different canonical hash) and
    /// emitting the appropriate event unless `skip_emit`.
    pub fn put_blocks(
        &self,
        blocks: Vec<SealedBlock>,
        skip_update_head: bool,
        skip_emit: bool,
    ) -> Result<(), ProviderError> {
        if blocks.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write();

        // Validate linkage and compute total difficulty before mutating
        // anything, so a rejected batch leaves no partial state behind.
        let mut parent_hash = blocks[0].parent_hash();
        let mut parent_td = inner
            .total_difficulty
            .get(&parent_hash)
            .copied()
            .ok_or(ProviderError::StateNotFound {
                hash: parent_hash,
                number: blocks[0].number().saturating_sub(1),
            })?;

        let mut tds = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 && block.parent_hash() != parent_hash {
                return Err(ProviderError::InvalidBlock(format!(
                    "block {} parent hash {} does not match predecessor hash {}",
                    block.number(),
                    block.parent_hash(),
                    parent_hash
                )));
            }
            let td = parent_td + block.header.difficulty;
            tds.push(td);
            parent_hash = block.hash();
            parent_td = td;
        }

        // Detect a reorg: any block number in this batch that already
        // has a *different* canonical hash.
        let mut old_blocks = Vec::new();
        for block in &blocks {
            if let Some(existing_hash) = inner.canonical.get(&block.number()).copied() {
                if existing_hash != block.hash() {
                    if let Some(existing) = inner.blocks.get(&existing_hash).cloned() {
                        old_blocks.push(existing);
                    }
                }
            }
        }

        for (block, td) in blocks.iter().zip(tds.iter()) {
            inner.blocks.insert(block.hash(), block.clone());
            inner.total_difficulty.insert(block.hash(), *td);
        }

        if !skip_update_head {
            // Remove any now-stale canonical entries at or beyond a
            // reorg point, then write the new canonical range.
            if let Some(first_reorg_number) = old_blocks.iter().map(|b| b.number()).min() {
                let stale: Vec<BlockNumber> = inner
                    .canonical
                    .range(first_reorg_number..)
                    .map(|(n, _)| *n)
                    .collect();
                for number in stale {
                    inner.canonical.remove(&number);
                }
            }
            for block in &blocks {
                inner.canonical.insert(block.number(), block.hash());
            }
        }

        let event = if !old_blocks.is_empty() {
            ChainEvent::ChainReorg { old: old_blocks, new: blocks.clone() }
        } else {
            ChainEvent::ChainUpdated { new: blocks.clone() }
        };

        drop(inner);

        if !skip_emit {
            let _ = self.events.send(event);
        }

        Ok(())
    }

    /// `delBlock(hash)` (§4.1): removes a non-canonical block, used to
    /// purge invalid payloads. Refuses to delete a canonical block.
    pub fn del_block(&self, hash: BlockHash) -> Result<(), ProviderError> {
        let mut inner = self.inner.write();
        let Some(block) = inner.blocks.get(&hash).cloned() else {
            return Ok(());
        };
        if inner.canonical.get(&block.number()) == Some(&hash) {
            return Err(ProviderError::CannotDeleteCanonicalBlock(hash));
        }
        inner.blocks.remove(&hash);
        inner.total_difficulty.remove(&hash);
        inner.receipts.remove(&hash);
        inner.sidecars.remove(&hash);
        Ok(())
    }

    /// `getCanonicalSafeBlock()` (§4.1).
    pub fn canonical_safe_block(&self) -> Result<Option<SealedBlock>, ProviderError> {
        self.iterator_head(IteratorHead::Safe)
    }

    /// `getCanonicalFinalizedBlock()` (§4.1).
    pub fn canonical_finalized_block(&self) -> Result<Option<SealedBlock>, ProviderError> {
        self.iterator_head(IteratorHead::Finalized)
    }
}

impl HeaderProvider for ChainStore {
    fn header(&self, block_hash: &BlockHash) -> Result<Option<execution_primitives::Header>, ProviderError> {
        Ok(self.inner.read().blocks.get(block_hash).map(|b| b.header.header().clone()))
    }

    fn header_by_number(&self, num: BlockNumber) -> Result<Option<execution_primitives::Header>, ProviderError> {
        let inner = self.inner.read();
        let Some(hash) = inner.canonical.get(&num).copied() else { return Ok(None) };
        Ok(inner.blocks.get(&hash).map(|b| b.header.header().clone()))
    }
}

impl BlockNumReader for ChainStore {
    fn block_number(&self, hash: BlockHash) -> Result<Option<BlockNumber>, ProviderError> {
        let inner = self.inner.read();
        Ok(inner
            .blocks
            .get(&hash)
            .map(|b| b.number())
            .filter(|number| inner.canonical.get(number) == Some(&hash)))
    }

    fn block_hash(&self, number: BlockNumber) -> Result<Option<BlockHash>, ProviderError> {
        Ok(self.inner.read().canonical.get(&number).copied())
    }

    fn best_block_number(&self) -> Result<BlockNumber, ProviderError> {
        Ok(self.inner.read().canonical.keys().next_back().copied().unwrap_or_default())
    }
}

impl BlockHashReader for ChainStore {
    fn block_hash(&self, number: BlockNumber) -> Result<Option<BlockHash>, ProviderError> {
        BlockNumReader::block_hash(self, number)
    }

    fn canonical_hashes_range(
        &self,
        start: BlockNumber,
        end: BlockNumber,
    ) -> Result<Vec<BlockHash>, ProviderError> {
        let inner = self.inner.read();
        Ok((start..end).map_while(|n| inner.canonical.get(&n).copied()).collect())
    }
}

impl BlockProvider for ChainStore {
    fn block(&self, hash: BlockHash) -> Result<Option<SealedBlock>, ProviderError> {
        Ok(self.inner.read().blocks.get(&hash).cloned())
    }

    fn block_by_number(&self, number: BlockNumber) -> Result<Option<SealedBlock>, ProviderError> {
        let inner = self.inner.read();
        let Some(hash) = inner.canonical.get(&number).copied() else { return Ok(None) };
        Ok(inner.blocks.get(&hash).cloned())
    }
}

impl ReceiptProvider for ChainStore {
    fn receipts_by_block_hash(&self, hash: BlockHash) -> Result<Option<Receipts>, ProviderError> {
        Ok(self.inner.read().receipts.get(&hash).cloned())
    }

    fn receipts_by_block_number(&self, number: BlockNumber) -> Result<Option<Receipts>, ProviderError> {
        let inner = self.inner.read();
        let Some(hash) = inner.canonical.get(&number).copied() else { return Ok(None) };
        Ok(inner.receipts.get(&hash).cloned())
    }

    fn transaction_block_location(
        &self,
        tx_hash: alloy_primitives::TxHash,
    ) -> Result<Option<(BlockHash, u64)>, ProviderError> {
        let inner = self.inner.read();
        for (hash, block) in &inner.blocks {
            if inner.canonical.get(&block.number()) != Some(hash) {
                continue;
            }
            if let Some(index) = block.body.transactions.iter().position(|tx| *tx.tx_hash() == tx_hash) {
                return Ok(Some((*hash, index as u64)));
            }
        }
        Ok(None)
    }
}

impl TotalDifficultyProvider for ChainStore {
    fn total_difficulty(&self, hash: BlockHash, _number: BlockNumber) -> Result<Option<U256>, ProviderError> {
        Ok(self.inner.read().total_difficulty.get(&hash).copied())
    }
}

impl SidecarsProvider for ChainStore {
    fn sidecars(&self, block_hash: &BlockHash) -> Result<Option<BlobSidecars>, ProviderError> {
        Ok(self.inner.read().sidecars.get(block_hash).cloned())
    }

    fn sidecars_by_number(&self, num: BlockNumber) -> Result<Option<BlobSidecars>, ProviderError> {
        let inner = self.inner.read();
        let Some(hash) = inner.canonical.get(&num).copied() else { return Ok(None) };
        Ok(inner.sidecars.get(&hash).cloned())
    }
}

impl CanonStateTracker for ChainStore {
    fn canonical_head(&self) -> Result<SealedBlock, ProviderError> {
        let inner = self.inner.read();
        let (_, hash) = inner.canonical.iter().next_back().ok_or_else(|| {
            ProviderError::Database("chain store has no canonical blocks".to_string())
        })?;
        inner
            .blocks
            .get(hash)
            .cloned()
            .ok_or(ProviderError::UnknownBlockHash(*hash))
    }

    fn iterator_head(&self, which: IteratorHead) -> Result<Option<SealedBlock>, ProviderError> {
        let inner = self.inner.read();
        let Some(hash) = inner.iterator_heads.get(&which.into()).copied() else { return Ok(None) };
        Ok(inner.blocks.get(&hash).cloned())
    }

    /// `setIteratorHead(name, hash)` (§4.1): moves one of the three
    /// pointers; fails if `hash` is not known.
    fn set_iterator_head(&self, which: IteratorHead, hash: B256) -> Result<(), ProviderError> {
        let mut inner = self.inner.write();
        if !inner.blocks.contains_key(&hash) {
            return Err(ProviderError::UnknownBlockHash(hash));
        }
        inner.iterator_heads.insert(which.into(), hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_primitives::{Block, BlockBody};
    use execution_primitives_traits::Header;

    fn child_of(parent: &SealedBlock) -> SealedBlock {
        let header = Header {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            difficulty: U256::from(1),
            gas_limit: 30_000_000,
            timestamp: parent.header.timestamp + 12,
            ..Default::default()
        };
        Block { header, body: BlockBody::default() }.seal_slow()
    }

    fn genesis() -> SealedBlock {
        Block { header: Header { number: 0, ..Default::default() }, body: BlockBody::default() }.seal_slow()
    }

    #[test]
    fn canonical_head_tracks_latest_put_blocks() {
        let genesis = genesis();
        let store = ChainStore::new(genesis.clone(), BlockCacheLimits::default());
        let b1 = child_of(&genesis);
        let hash = b1.hash();

        store.put_blocks(vec![b1], false, true).unwrap();

        assert_eq!(store.canonical_head().unwrap().hash(), hash);
    }

    #[test]
    fn reorg_replaces_canonical_entry_and_emits_event() {
        let genesis = genesis();
        let store = ChainStore::new(genesis.clone(), BlockCacheLimits::default());
        let mut rx = store.subscribe();

        let a = child_of(&genesis);
        store.put_blocks(vec![a.clone()], false, true).unwrap();

        let mut b = child_of(&genesis);
        b.header = execution_primitives_traits::SealedHeader::seal_slow(Header {
            extra_data: alloy_primitives::Bytes::from_static(b"fork"),
            ..b.header.header().clone()
        });
        store.put_blocks(vec![b.clone()], false, false).unwrap();

        assert_eq!(store.canonical_head().unwrap().hash(), b.hash());
        match rx.try_recv() {
            Ok(ChainEvent::ChainReorg { old, new }) => {
                assert_eq!(old[0].hash(), a.hash());
                assert_eq!(new[0].hash(), b.hash());
            }
            other => panic!("expected ChainReorg, got {other:?}"),
        }
    }

    #[test]
    fn set_iterator_head_rejects_unknown_hash() {
        let genesis = genesis();
        let store = ChainStore::new(genesis, BlockCacheLimits::default());
        let err = store.set_iterator_head(IteratorHead::Safe, B256::repeat_byte(0xaa)).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownBlockHash(_)));
    }
}
