//! The chain store (§4.1): an append-only record of headers, bodies,
//! receipts and total difficulty, plus the three named iterator heads
//! (`vm`, `safe`, `finalized`) and the canonical `number -> hash` index.
//!
//! The concrete key-value engine is out of scope (§1); this crate is an
//! in-memory implementation of the [`execution_storage_api`] traits,
//! guarded by `parking_lot::RwLock` the way the teacher's in-memory test
//! providers are, so a real disk-backed engine could be swapped in later
//! without touching callers.

mod cache;
mod event;
mod store;

pub use cache::{BlockCacheLimits, BoundedBlockCache};
pub use event::ChainEvent;
pub use store::ChainStore;
