//! Primitive types shared by every layer of the execution core.
//!
//! This crate intentionally re-uses [`alloy_consensus::Header`] as the
//! canonical block header type rather than redefining the field set from
//! scratch: the header already carries every hard-fork-gated field the spec
//! calls for (`base_fee_per_gas`, `withdrawals_root`, `blob_gas_used`,
//! `excess_blob_gas`, `parent_beacon_block_root`, `requests_hash`), and
//! keeping a single source of truth for RLP/serde keeps this crate from
//! drifting out of sync with the wire format.

pub mod account;
pub mod blob_sidecar;
pub mod constants;
pub mod sealed;

pub use account::{Account, Bytecode};
pub use blob_sidecar::{BlobSidecar, BlobSidecars};
pub use sealed::SealedHeader;

/// Canonical block header.
///
/// Alias kept distinct from `alloy_consensus::Header` so call sites read
/// `execution_primitives_traits::Header` the way the teacher's call sites
/// read `reth_primitives_traits::Header`, without forking the type itself.
pub type Header = alloy_consensus::Header;

/// A withdrawal processed as part of the Shanghai fork.
pub type Withdrawal = alloy_eips::eip4895::Withdrawal;

/// A list of withdrawals, ordered the way they appear in the block body.
pub type Withdrawals = alloy_eips::eip4895::Withdrawals;

/// An EIP-7685 execution layer request (Prague).
pub type Request = alloy_eips::eip7685::Requests;

/// EVM log entry, shared between receipts and execution outcomes.
pub type Log = alloy_primitives::Log;

/// Block number newtype alias, kept for readability at call sites.
pub type BlockNumber = u64;

/// Chain id newtype alias.
pub type ChainId = u64;
