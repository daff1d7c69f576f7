//! Shared payload types (§4.4, §4.6): the payload ID computation, the
//! attributes a build is keyed against, and the value a finished build
//! produces.

use std::sync::Arc;

use alloy_eips::eip4895::Withdrawals;
use alloy_primitives::{keccak256, Address, BlockHash, B256, U256};
pub use alloy_rpc_types_engine::{PayloadAttributes, PayloadId};
use execution_primitives::{BlobSidecars, Receipts, Request, SealedBlock};

/// Computes the 8-byte payload id for a build configuration (§4.4):
/// `keccak(parentHash ∥ mixHash ∥ timestamp ∥ gasLimit ∥
/// parentBeaconBlockRoot ∥ coinbase ∥ encoded(withdrawals))`. Fields not
/// applicable to the active hardfork are replaced with canonical zeroes
/// by the caller before this is invoked.
pub fn payload_id(
    parent_hash: BlockHash,
    mix_hash: B256,
    timestamp: u64,
    gas_limit: u64,
    parent_beacon_block_root: Option<B256>,
    coinbase: Address,
    withdrawals: Option<&Withdrawals>,
) -> PayloadId {
    let mut buf = Vec::with_capacity(32 + 32 + 8 + 8 + 32 + 20 + 64);
    buf.extend_from_slice(parent_hash.as_slice());
    buf.extend_from_slice(mix_hash.as_slice());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&gas_limit.to_be_bytes());
    buf.extend_from_slice(parent_beacon_block_root.unwrap_or_default().as_slice());
    buf.extend_from_slice(coinbase.as_slice());
    if let Some(withdrawals) = withdrawals {
        for withdrawal in withdrawals {
            buf.extend_from_slice(&withdrawal.index.to_be_bytes());
            buf.extend_from_slice(&withdrawal.validator_index.to_be_bytes());
            buf.extend_from_slice(withdrawal.address.as_slice());
            buf.extend_from_slice(&withdrawal.amount.to_be_bytes());
        }
    }
    let hash = keccak256(buf);
    PayloadId::new(hash[..8].try_into().expect("8 bytes"))
}

/// The build configuration a payload id resolves to (§4.4 "Payload
/// cache entry" minus the in-progress builder itself, which lives in
/// `execution-payload-builder`).
#[derive(Debug, Clone)]
pub struct PayloadBuilderAttributes {
    /// This build's payload id.
    pub id: PayloadId,
    /// The block this build extends.
    pub parent: BlockHash,
    /// Requested timestamp, fee recipient, randao, withdrawals and
    /// parent beacon block root.
    pub attributes: PayloadAttributes,
}

impl PayloadBuilderAttributes {
    /// Derives the payload id from `parent` and `attributes` and bundles
    /// them together.
    pub fn new(parent: BlockHash, attributes: PayloadAttributes) -> Self {
        let withdrawals = attributes.withdrawals.as_ref().map(|w| Withdrawals::new(w.clone()));
        let id = payload_id(
            parent,
            attributes.prev_randao,
            attributes.timestamp,
            0,
            attributes.parent_beacon_block_root,
            attributes.suggested_fee_recipient,
            withdrawals.as_ref(),
        );
        Self { id, parent, attributes }
    }
}

/// The outcome of a finished build (§4.4 `build()` return tuple).
#[derive(Debug, Clone)]
pub struct BuiltPayload {
    /// This build's payload id.
    pub id: PayloadId,
    /// The assembled block.
    pub block: Arc<SealedBlock>,
    /// Receipts for every transaction the block includes, in order.
    pub receipts: Arc<Receipts>,
    /// Total fees paid to the block's fee recipient.
    pub fees: U256,
    /// Blob sidecars for any EIP-4844 transactions included, if any.
    pub sidecars: Option<BlobSidecars>,
    /// EIP-7685 requests produced by this block's execution, once
    /// Prague is active.
    pub requests: Option<Request>,
}

/// Failures the build pipeline can report.
#[derive(Debug, thiserror::Error)]
pub enum PayloadBuilderError {
    /// No in-progress (or cached) builder exists for the requested id.
    #[error("unknown payload id")]
    UnknownPayload,

    /// The channel used to deliver build results was dropped before a
    /// result arrived.
    #[error("payload builder task dropped before producing a result")]
    ChannelClosed,

    /// Block execution failed while assembling the candidate block.
    #[error(transparent)]
    Execution(#[from] execution_errors::ExecutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_id_is_deterministic() {
        let a = payload_id(BlockHash::repeat_byte(1), B256::ZERO, 10, 30_000_000, None, Address::ZERO, None);
        let b = payload_id(BlockHash::repeat_byte(1), B256::ZERO, 10, 30_000_000, None, Address::ZERO, None);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_timestamps_yield_distinct_ids() {
        let a = payload_id(BlockHash::repeat_byte(1), B256::ZERO, 10, 30_000_000, None, Address::ZERO, None);
        let b = payload_id(BlockHash::repeat_byte(1), B256::ZERO, 11, 30_000_000, None, Address::ZERO, None);
        assert_ne!(a, b);
    }
}
