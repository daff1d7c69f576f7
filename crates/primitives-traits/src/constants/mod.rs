//! Protocol-level constants used across the chain store, VM execution
//! engine and block builder.

use alloy_primitives::{address, b256, Address, B256};

/// Gas units, for example [`GIGAGAS`].
pub mod gas_units;
pub use gas_units::{GIGAGAS, KILOGAS, MEGAGAS};

/// The client version string reported by the node.
pub const CLIENT_VERSION: &str = concat!("execution-core/v", env!("CARGO_PKG_VERSION"));

/// The zero-nonce system-call sender used for EIP-4788/7002/7251 system
/// contract calls.
pub const SYSTEM_ADDRESS: Address = address!("fffffffffffffffffffffffffffffffffffffffe");

/// Maximum extra data size allowed in a block header after genesis.
pub const MAXIMUM_EXTRA_DATA_SIZE: usize = 32;

/// Initial base fee as defined in [EIP-1559](https://eips.ethereum.org/EIPS/eip-1559).
pub const EIP1559_INITIAL_BASE_FEE: u64 = 1_000_000_000;

/// Minimum gas limit allowed for any transaction or block.
pub const MINIMUM_GAS_LIMIT: u64 = 5_000;

/// Gas cost of the cheapest possible transaction (a bare value transfer).
///
/// The block builder's selection loop (§4.4) treats a block with less than
/// this much gas remaining as full, since no candidate transaction can fit.
pub const MIN_TRANSACTION_GAS: u64 = 21_000;

/// Keccak256 of the RLP encoding of an empty byte string; the code hash of
/// an account with no code.
pub const KECCAK_EMPTY: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a47");

/// Root hash of an empty ommers list.
pub const EMPTY_OMMER_ROOT_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d4934");

/// Root hash of an empty Merkle-Patricia trie.
pub const EMPTY_ROOT_HASH: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b42");

/// Empty mix hash, used on fork-zeroed header fields post-merge.
pub const EMPTY_MIX_HASH: B256 = B256::ZERO;

/// Root hash of an empty withdrawals list (EIP-4895). Numerically equal
/// to [`EMPTY_ROOT_HASH`] since both are the root of an empty ordered
/// trie, kept as a separate name for readability at call sites.
pub const EMPTY_WITHDRAWALS_ROOT: B256 = EMPTY_ROOT_HASH;

/// The number of blocks to unwind during a reorg that already became part
/// of the canonical chain before the conflict was detected.
///
/// In practice the node only hits this if the process was abruptly
/// terminated mid-reorg and stayed down for a long time. An unwind depth of
/// 3 blocks significantly reduces the chance that the reorged block is kept
/// in the database.
pub const BEACON_CONSENSUS_REORG_UNWIND_DEPTH: u64 = 3;

/// Default threshold (in blocks) beyond which [`VmExecutionEngine::run`]
/// logs a warning instead of proceeding silently through a deep reorg.
///
/// [`VmExecutionEngine::run`]: https://docs.rs/execution-revm
pub const DEFAULT_SAFE_REORG_DISTANCE: u64 = 64;

/// Maximum number of blob-carrying transactions accepted per block under
/// the Cancun baseline (EIP-4844).
pub const MAX_BLOBS_PER_BLOCK_CANCUN: u64 = 6;

/// Gas charged per blob; used to translate `maxBlobGasPerBlock` into a
/// transaction count ceiling for the block builder.
pub const GAS_PER_BLOB: u64 = 131_072;

/// TTL for a cached in-progress payload build (§3 "Payload cache entry").
pub const PAYLOAD_CACHE_TTL_MS: u64 = 2_000;

/// Maximum number of concurrent in-progress builders the payload cache
/// retains (§3, §4.4 `start`).
pub const MAX_CACHED_PAYLOADS: usize = 2;
