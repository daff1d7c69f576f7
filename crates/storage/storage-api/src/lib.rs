//! Trait boundary between the chain store's algorithms and whatever
//! key-value engine ultimately backs it.
//!
//! The concrete engine is out of scope (§1 Non-goals); everything in
//! this crate is a trait so a real implementation can be swapped in
//! without touching the chain store, VM execution engine or block
//! builder, the same seam the teacher draws between `reth-storage-api`
//! and `reth-db`/`reth-provider`.

mod block;
mod canon;
mod header;
mod receipts;
mod sidecars;
mod td;

pub use block::{BlockHashReader, BlockNumReader, BlockProvider};
pub use canon::{CanonStateNotification, CanonStateTracker, IteratorHead};
pub use header::HeaderProvider;
pub use receipts::ReceiptProvider;
pub use sidecars::SidecarsProvider;
pub use td::TotalDifficultyProvider;
