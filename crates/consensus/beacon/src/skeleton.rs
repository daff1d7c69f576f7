//! Skeleton sync (§4.5): the local bookkeeping a post-merge node keeps
//! while backfilling a chain it only has a floating header tip for.
//!
//! A "subchain" is a contiguous run of headers bounded by a known
//! `head` and an as-yet-unconnected `tail`. `setHead`/`forkchoiceUpdate`
//! extend the newest subchain when the supplied header links directly
//! onto it, or open a fresh one when it doesn't (a reorg, or the first
//! header seen after a cold start). Fetching the bodies that would
//! close the gap between a subchain's tail and the node's own canonical
//! chain happens over the wire in the teacher (`reth-network-p2p`'s
//! downloader); that transport is out of scope here; `try_merge` models
//! only the local half of that handshake — folding a subchain in once
//! its tail is already present in the chain store.

use std::collections::HashMap;

use alloy_primitives::B256;
use execution_primitives_traits::{BlockNumber, SealedHeader};
use schnellru::{ByLength, LruMap};

/// `fillStatus` (§4.5): how far along the skeleton's backfill is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillStatus {
    /// The skeleton's oldest subchain now connects all the way down to
    /// a block the node already holds; nothing left to fill.
    Valid,
    /// A header in the skeleton failed validation.
    Invalid {
        /// Why it was rejected.
        validation_error: String,
    },
    /// Still waiting on bodies to connect the skeleton to known chain.
    Syncing {
        /// The height of the newest subchain's head, if any exists yet.
        height: Option<BlockNumber>,
    },
}

/// A contiguous run of skeleton headers, newest (`head`) to oldest
/// (`tail`), not yet known to connect to the node's canonical chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subchain {
    /// Hash of the subchain's newest header.
    pub head_hash: B256,
    /// Height of the subchain's newest header.
    pub head_number: BlockNumber,
    /// Hash of the subchain's oldest header.
    pub tail_hash: B256,
    /// Height of the subchain's oldest header.
    pub tail_number: BlockNumber,
}

/// Default capacity for the skeleton's header cache (`headerCacheCapacity`).
pub const DEFAULT_HEADER_CACHE_CAPACITY: u32 = 1024;

/// Owns every subchain the node currently knows about, newest-last.
pub struct Skeleton {
    subchains: Vec<Subchain>,
    headers: LruMap<B256, SealedHeader>,
    fill_status: FillStatus,
}

impl Skeleton {
    /// An empty skeleton, not yet synced to anything.
    pub fn new(header_cache_capacity: u32) -> Self {
        Self {
            subchains: Vec::new(),
            headers: LruMap::new(ByLength::new(header_cache_capacity)),
            fill_status: FillStatus::Syncing { height: None },
        }
    }

    /// The current `fillStatus`.
    pub fn fill_status(&self) -> FillStatus {
        self.fill_status.clone()
    }

    /// Every subchain currently tracked, newest last.
    pub fn subchains(&self) -> &[Subchain] {
        &self.subchains
    }

    /// A cached header by hash, if the skeleton has seen it.
    pub fn header(&mut self, hash: &B256) -> Option<&SealedHeader> {
        self.headers.get(hash)
    }

    /// `setHead(header, force?)` (§4.5): extends the newest subchain if
    /// `header` links onto it; otherwise opens a new subchain only when
    /// `force` is set (an unforced call from an unconnected header is a
    /// no-op, matching "unsolicited headers are dropped unless the peer
    /// forced the reorg").
    ///
    /// Returns whether the header was accepted into the skeleton.
    pub fn set_head(&mut self, header: SealedHeader, force: bool) -> bool {
        let hash = header.hash();
        let number = header.number;

        if let Some(newest) = self.subchains.last_mut() {
            if header.parent_hash == newest.head_hash {
                newest.head_hash = hash;
                newest.head_number = number;
                self.headers.insert(hash, header);
                self.fill_status = FillStatus::Syncing { height: Some(number) };
                return true;
            }
        }

        if !force {
            return false;
        }

        self.subchains.push(Subchain { head_hash: hash, head_number: number, tail_hash: hash, tail_number: number });
        self.headers.insert(hash, header);
        self.fill_status = FillStatus::Syncing { height: Some(number) };
        true
    }

    /// `forkchoiceUpdate(headBlock, {safe, finalized})` (§4.5): the
    /// forkchoice-driven counterpart to `setHead` — a new beacon head
    /// that doesn't extend the current subchain always opens a fresh
    /// one (forkchoice updates are never dropped the way unsolicited
    /// `setHead` calls can be; the consensus layer is authoritative).
    /// `safe`/`finalized` bound how far back a subchain may be pruned
    /// but aren't tracked as distinct skeleton state here — the chain
    /// store owns canonical safe/finalized bookkeeping (§4.1).
    pub fn forkchoice_update(&mut self, head: SealedHeader, _safe_hash: B256, _finalized_hash: B256) -> FillStatus {
        let hash = head.hash();
        let number = head.number;

        let extends_newest =
            self.subchains.last().is_some_and(|newest| head.parent_hash == newest.head_hash);

        if extends_newest {
            let newest = self.subchains.last_mut().expect("checked above");
            newest.head_hash = hash;
            newest.head_number = number;
        } else if self.subchains.last().map(|s| s.head_hash) != Some(hash) {
            self.subchains.push(Subchain { head_hash: hash, head_number: number, tail_hash: hash, tail_number: number });
        }

        self.headers.insert(hash, head);
        self.fill_status = FillStatus::Syncing { height: Some(number) };
        self.fill_status.clone()
    }

    /// `getBlockByHash` bookkeeping (§4.5): whether `hash` falls within
    /// the range of any tracked subchain (cheap membership check; the
    /// block body itself lives in the chain store's remote-block cache,
    /// not here).
    pub fn contains(&self, hash: B256) -> bool {
        self.subchains.iter().any(|s| s.head_hash == hash || s.tail_hash == hash)
    }

    /// `deleteBlock(hash)` (§4.5): drops a header from the skeleton,
    /// shrinking or removing whichever subchain it bounds.
    pub fn delete_block(&mut self, hash: B256) {
        self.headers.remove(&hash);
        self.subchains.retain(|s| s.head_hash != hash && s.tail_hash != hash);
    }

    /// `fillStatus` transition once a subchain's tail connects to a
    /// block the chain store already holds: marks the skeleton `Valid`
    /// and drops the now-filled subchain (§4.5 "fetcher/filler" merge,
    /// local half — see module docs).
    pub fn try_merge(&mut self, connects_tail: impl Fn(B256) -> bool) {
        if let Some(oldest) = self.subchains.first() {
            if connects_tail(oldest.tail_hash) {
                self.subchains.remove(0);
                self.fill_status = if self.subchains.is_empty() {
                    FillStatus::Valid
                } else {
                    FillStatus::Syncing { height: self.subchains.last().map(|s| s.head_number) }
                };
            }
        }
    }

    /// Marks the skeleton invalid, e.g. after a header in it fails
    /// consensus validation.
    pub fn mark_invalid(&mut self, validation_error: String) {
        self.fill_status = FillStatus::Invalid { validation_error };
    }
}

impl std::fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skeleton")
            .field("subchains", &self.subchains)
            .field("fill_status", &self.fill_status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_primitives_traits::Header;

    fn header(number: BlockNumber, parent_hash: B256) -> SealedHeader {
        Header { number, parent_hash, ..Default::default() }.seal_slow()
    }

    #[test]
    fn set_head_without_force_on_unconnected_header_is_rejected() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let h = header(10, B256::repeat_byte(1));
        assert!(!skeleton.set_head(h, false));
        assert!(skeleton.subchains().is_empty());
    }

    #[test]
    fn set_head_with_force_opens_a_subchain() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let h = header(10, B256::repeat_byte(1));
        assert!(skeleton.set_head(h.clone(), true));
        assert_eq!(skeleton.subchains().len(), 1);
        assert_eq!(skeleton.subchains()[0].head_hash, h.hash());
    }

    #[test]
    fn set_head_extends_the_newest_subchain() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let first = header(10, B256::repeat_byte(1));
        skeleton.set_head(first.clone(), true);

        let second = header(11, first.hash());
        assert!(skeleton.set_head(second.clone(), false));
        assert_eq!(skeleton.subchains().len(), 1);
        assert_eq!(skeleton.subchains()[0].head_hash, second.hash());
        assert_eq!(skeleton.subchains()[0].tail_hash, first.hash());
    }

    #[test]
    fn forkchoice_update_on_reorg_opens_a_new_subchain() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let first = header(10, B256::repeat_byte(1));
        skeleton.set_head(first, true);

        let reorg_head = header(10, B256::repeat_byte(9));
        skeleton.forkchoice_update(reorg_head.clone(), B256::ZERO, B256::ZERO);
        assert_eq!(skeleton.subchains().len(), 2);
        assert_eq!(skeleton.subchains().last().unwrap().head_hash, reorg_head.hash());
    }

    #[test]
    fn delete_block_drops_the_owning_subchain() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let h = header(10, B256::repeat_byte(1));
        skeleton.set_head(h.clone(), true);
        skeleton.delete_block(h.hash());
        assert!(skeleton.subchains().is_empty());
    }

    #[test]
    fn try_merge_clears_a_connected_subchain() {
        let mut skeleton = Skeleton::new(DEFAULT_HEADER_CACHE_CAPACITY);
        let h = header(10, B256::repeat_byte(1));
        skeleton.set_head(h, true);

        skeleton.try_merge(|_| true);
        assert!(skeleton.subchains().is_empty());
        assert_eq!(skeleton.fill_status(), FillStatus::Valid);
    }
}
