//! Engine API wire types and payload/block conversion (§4.6).
//!
//! The wire shapes themselves are not redefined here: `alloy-rpc-types-engine`
//! already carries the bit-exact JSON shapes (`ExecutionPayloadV1/V2/V3`,
//! `PayloadStatus`, `ForkchoiceState`, `PayloadAttributes`, `JwtSecret`), the
//! same way `execution_primitives_traits` reuses `alloy_consensus::Header`
//! instead of forking it. This crate supplies what alloy doesn't: the
//! `ExecutionPayload <-> SealedBlock` conversion the engine service needs at
//! its edges.

use alloy_consensus::EMPTY_OMMER_ROOT_HASH;
use alloy_eips::{
    eip2718::{Decodable2718, Encodable2718},
    merge::BEACON_NONCE,
};
use alloy_primitives::{B256, U256};
pub use alloy_rpc_types_engine::{
    BlobsBundleV1, ExecutionPayload, ExecutionPayloadV1, ExecutionPayloadV2, ExecutionPayloadV3,
    ForkchoiceState, ForkchoiceUpdated, JwtError, JwtSecret, PayloadAttributes, PayloadId,
    PayloadStatus, PayloadStatusEnum,
};
use execution_payload_primitives::BuiltPayload;
use execution_primitives::{proofs, Block, BlockBody, Header, SealedBlock, TransactionSigned};
use execution_primitives_traits::{BlobSidecars, Withdrawals};

/// Failures converting between an Engine API wire payload and a
/// [`SealedBlock`] (§4.6 `newPayload` step 2, `INVALID_BLOCK_HASH`).
#[derive(Debug, thiserror::Error)]
pub enum PayloadConversionError {
    /// The recomputed header hash does not match `payload.block_hash`.
    #[error("block hash mismatch: computed {computed}, payload declares {declared}")]
    BlockHashMismatch {
        /// Hash computed from the assembled header.
        computed: B256,
        /// Hash the payload itself declares.
        declared: B256,
    },
    /// A transaction in the payload's opaque byte list failed to decode.
    #[error("failed to decode transaction {index}")]
    InvalidTransaction {
        /// Index of the offending transaction within `payload.transactions`.
        index: usize,
    },
    /// Cancun+ payloads require a `parentBeaconBlockRoot` sidecar the
    /// engine service must supply out of band.
    #[error("parentBeaconBlockRoot is required for this payload version")]
    MissingParentBeaconBlockRoot,
}

/// Decodes a payload's opaque transaction byte list (§4.6 `newPayload`
/// step 2).
fn decode_transactions(
    transactions: Vec<alloy_primitives::Bytes>,
) -> Result<Vec<TransactionSigned>, PayloadConversionError> {
    transactions
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            TransactionSigned::decode_2718(&mut raw.as_ref())
                .map_err(|_| PayloadConversionError::InvalidTransaction { index })
        })
        .collect()
}

/// Assembles a [`SealedBlock`] from a decoded header and transaction list,
/// then verifies the recomputed hash against `block_hash` (§4.6
/// `newPayload` step 2, `INVALID_BLOCK_HASH`).
fn assemble(
    mut header: Header,
    transactions: Vec<TransactionSigned>,
    withdrawals: Option<Withdrawals>,
    declared_hash: B256,
) -> Result<SealedBlock, PayloadConversionError> {
    header.transactions_root = proofs::calculate_transaction_root(&transactions);

    let body = BlockBody { transactions, ommers: Vec::new(), withdrawals, requests: None };
    let block = Block { header, body }.seal_slow();

    if block.hash() != declared_hash {
        return Err(PayloadConversionError::BlockHashMismatch {
            computed: block.hash(),
            declared: declared_hash,
        });
    }
    Ok(block)
}

/// Converts an [`ExecutionPayloadV1`] (pre-Shanghai) into a [`SealedBlock`].
pub fn try_payload_v1_to_block(
    payload: ExecutionPayloadV1,
) -> Result<SealedBlock, PayloadConversionError> {
    let hash = payload.block_hash;
    let header = header_v1(&payload)?;
    let transactions = decode_transactions(payload.transactions)?;
    assemble(header, transactions, None, hash)
}

/// Converts an [`ExecutionPayloadV2`] (post-Shanghai, adds withdrawals)
/// into a [`SealedBlock`].
pub fn try_payload_v2_to_block(
    payload: ExecutionPayloadV2,
) -> Result<SealedBlock, PayloadConversionError> {
    let withdrawals = Withdrawals::new(payload.withdrawals);
    let withdrawals_root = proofs::calculate_withdrawals_root(&withdrawals);
    let hash = payload.payload_inner.block_hash;

    let mut header = header_v1(&payload.payload_inner)?;
    header.withdrawals_root = Some(withdrawals_root);
    let transactions = decode_transactions(payload.payload_inner.transactions)?;

    assemble(header, transactions, Some(withdrawals), hash)
}

/// Converts an [`ExecutionPayloadV3`] (post-Cancun, adds blob gas
/// accounting) into a [`SealedBlock`]. `parent_beacon_block_root` arrives
/// out of band, as the wire payload itself does not carry it.
pub fn try_payload_v3_to_block(
    payload: ExecutionPayloadV3,
    parent_beacon_block_root: B256,
) -> Result<SealedBlock, PayloadConversionError> {
    let withdrawals = Withdrawals::new(payload.payload_inner.withdrawals);
    let withdrawals_root = proofs::calculate_withdrawals_root(&withdrawals);
    let hash = payload.payload_inner.payload_inner.block_hash;

    let mut header = header_v1(&payload.payload_inner.payload_inner)?;
    header.withdrawals_root = Some(withdrawals_root);
    header.blob_gas_used = Some(payload.blob_gas_used);
    header.excess_blob_gas = Some(payload.excess_blob_gas);
    header.parent_beacon_block_root = Some(parent_beacon_block_root);
    let transactions = decode_transactions(payload.payload_inner.payload_inner.transactions)?;

    assemble(header, transactions, Some(withdrawals), hash)
}

fn header_v1(payload: &ExecutionPayloadV1) -> Result<Header, PayloadConversionError> {
    Ok(Header {
        parent_hash: payload.parent_hash,
        ommers_hash: EMPTY_OMMER_ROOT_HASH,
        beneficiary: payload.fee_recipient,
        state_root: payload.state_root,
        transactions_root: Default::default(),
        receipts_root: payload.receipts_root,
        logs_bloom: payload.logs_bloom,
        difficulty: U256::ZERO,
        number: payload.block_number,
        gas_limit: payload.gas_limit,
        gas_used: payload.gas_used,
        timestamp: payload.timestamp,
        extra_data: payload.extra_data.clone(),
        mix_hash: payload.prev_randao,
        nonce: BEACON_NONCE.into(),
        base_fee_per_gas: Some(payload.base_fee_per_gas.to::<u64>()),
        withdrawals_root: None,
        blob_gas_used: None,
        excess_blob_gas: None,
        parent_beacon_block_root: None,
        requests_hash: None,
    })
}

/// Dispatches on `payload`'s variant to produce a [`SealedBlock`] (§4.6
/// `newPayload` step 2, version-independent assembly).
pub fn try_into_block(
    payload: ExecutionPayload,
    parent_beacon_block_root: Option<B256>,
) -> Result<SealedBlock, PayloadConversionError> {
    match payload {
        ExecutionPayload::V1(payload) => try_payload_v1_to_block(payload),
        ExecutionPayload::V2(payload) => try_payload_v2_to_block(payload),
        ExecutionPayload::V3(payload) => {
            let root = parent_beacon_block_root
                .ok_or(PayloadConversionError::MissingParentBeaconBlockRoot)?;
            try_payload_v3_to_block(payload, root)
        }
    }
}

fn block_to_payload_v1(block: &SealedBlock) -> ExecutionPayloadV1 {
    ExecutionPayloadV1 {
        parent_hash: block.parent_hash(),
        fee_recipient: block.header.beneficiary,
        state_root: block.header.state_root,
        receipts_root: block.header.receipts_root,
        logs_bloom: block.header.logs_bloom,
        prev_randao: block.header.mix_hash,
        block_number: block.number(),
        gas_limit: block.header.gas_limit,
        gas_used: block.header.gas_used,
        timestamp: block.header.timestamp,
        extra_data: block.header.extra_data.clone(),
        base_fee_per_gas: U256::from(block.header.base_fee_per_gas.unwrap_or_default()),
        block_hash: block.hash(),
        transactions: block
            .body
            .transactions
            .iter()
            .map(|tx| alloy_primitives::Bytes::from(tx.encoded_2718()))
            .collect(),
    }
}

/// Formats `block` as an [`ExecutionPayloadV2`] (§4.6 `getPayload`
/// response formatting, post-Shanghai).
pub fn block_to_payload_v2(block: &SealedBlock) -> ExecutionPayloadV2 {
    ExecutionPayloadV2 {
        payload_inner: block_to_payload_v1(block),
        withdrawals: block.body.withdrawals.clone().unwrap_or_default().into_inner(),
    }
}

/// Formats `block` as an [`ExecutionPayloadV3`] (post-Cancun, adds blob
/// gas accounting).
pub fn block_to_payload_v3(block: &SealedBlock) -> ExecutionPayloadV3 {
    ExecutionPayloadV3 {
        payload_inner: block_to_payload_v2(block),
        blob_gas_used: block.header.blob_gas_used.unwrap_or_default(),
        excess_blob_gas: block.header.excess_blob_gas.unwrap_or_default(),
    }
}

/// Picks the right [`ExecutionPayload`] variant for `block`'s active
/// hardfork, judged purely from which header fields it carries.
pub fn block_to_payload(block: &SealedBlock) -> ExecutionPayload {
    if block.header.blob_gas_used.is_some() {
        ExecutionPayload::V3(block_to_payload_v3(block))
    } else if block.header.withdrawals_root.is_some() {
        ExecutionPayload::V2(block_to_payload_v2(block))
    } else {
        ExecutionPayload::V1(block_to_payload_v1(block))
    }
}

/// A successful build, formatted for the Engine API `getPayload` response
/// (§4.6 `getPayload` step 4): the payload itself, plus the miner value
/// and (from Cancun) the blob bundle every version beyond V1 reports.
#[derive(Debug, Clone)]
pub struct EngineGetPayloadResponse {
    /// The assembled block, in wire form.
    pub execution_payload: ExecutionPayload,
    /// Total priority fees paid to the block's fee recipient.
    pub block_value: U256,
    /// Blobs, commitments and proofs for the block's 4844 transactions,
    /// present from Cancun onward whenever the block included any.
    pub blobs_bundle: Option<BlobsBundleV1>,
}

/// Formats a finished build for the Engine API (§4.6 `getPayload`).
pub fn built_payload_to_response(payload: &BuiltPayload) -> EngineGetPayloadResponse {
    EngineGetPayloadResponse {
        execution_payload: block_to_payload(&payload.block),
        block_value: payload.fees,
        blobs_bundle: payload.sidecars.as_ref().map(sidecars_to_blobs_bundle),
    }
}

/// Flattens the per-transaction [`BlobSidecars`] this build collected
/// into the single `{commitments, proofs, blobs}` triple
/// `engine_getPayloadV3`/`V4` report (§4.4 "per-payload bundle").
fn sidecars_to_blobs_bundle(sidecars: &BlobSidecars) -> BlobsBundleV1 {
    let mut commitments = Vec::new();
    let mut proofs = Vec::new();
    let mut blobs = Vec::new();
    for sidecar in sidecars.iter() {
        commitments.extend(sidecar.blob_transaction_sidecar.commitments.iter().copied());
        proofs.extend(sidecar.blob_transaction_sidecar.proofs.iter().copied());
        blobs.extend(sidecar.blob_transaction_sidecar.blobs.iter().copied());
    }
    BlobsBundleV1 { commitments, proofs, blobs }
}

/// Convenience constructors for the four [`PayloadStatus`] outcomes
/// `newPayload`/`forkchoiceUpdated` can report (§4.6, §7).
pub mod payload_status {
    use super::{PayloadStatus, PayloadStatusEnum, B256};

    /// `VALID`, with the given block as the new latest valid hash.
    pub fn valid(latest_valid_hash: B256) -> PayloadStatus {
        PayloadStatus::new(PayloadStatusEnum::Valid, Some(latest_valid_hash))
    }

    /// `INVALID`, carrying the validation error and the deepest known-good
    /// ancestor (§7 "INVALID payload responses always include
    /// latestValidHash").
    pub fn invalid(validation_error: String, latest_valid_hash: B256) -> PayloadStatus {
        PayloadStatus::new(
            PayloadStatusEnum::Invalid { validation_error },
            Some(latest_valid_hash),
        )
    }

    /// `INVALID_BLOCK_HASH`: the recomputed header hash didn't match the
    /// payload's declared `blockHash` (§4.6 `newPayload` step 2, V1 only
    /// — "coerced to INVALID on V2+", so callers on later versions
    /// should use [`invalid`] instead).
    pub fn invalid_block_hash() -> PayloadStatus {
        PayloadStatus::new(PayloadStatusEnum::InvalidBlockHash, None)
    }

    /// `SYNCING`: the CL should retry later, no hash is reported yet.
    pub fn syncing() -> PayloadStatus {
        PayloadStatus::new(PayloadStatusEnum::Syncing, None)
    }

    /// `ACCEPTED`: stored but not yet connected to the known chain.
    pub fn accepted() -> PayloadStatus {
        PayloadStatus::new(PayloadStatusEnum::Accepted, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_block() -> SealedBlock {
        Block {
            header: Header { number: 0, gas_limit: 30_000_000, ..Default::default() },
            body: BlockBody::default(),
        }
        .seal_slow()
    }

    #[test]
    fn payload_v1_round_trips_through_block() {
        let block = genesis_block();
        let payload = block_to_payload_v1(&block);
        let recovered = try_payload_v1_to_block(payload).unwrap();
        assert_eq!(recovered.hash(), block.hash());
    }

    #[test]
    fn block_hash_mismatch_is_rejected() {
        let block = genesis_block();
        let mut payload = block_to_payload_v1(&block);
        payload.block_hash = B256::repeat_byte(0xee);
        let err = try_payload_v1_to_block(payload).unwrap_err();
        assert!(matches!(err, PayloadConversionError::BlockHashMismatch { .. }));
    }

    #[test]
    fn payload_status_helpers_set_latest_valid_hash() {
        let hash = B256::repeat_byte(1);
        let status = payload_status::valid(hash);
        assert_eq!(status.latest_valid_hash, Some(hash));
        assert!(matches!(status.status, PayloadStatusEnum::Valid));
    }
}
