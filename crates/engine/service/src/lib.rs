//! The Engine API method surface (§4.6, §6): version-gated
//! `newPayload`/`forkchoiceUpdated`/`getPayload`, dispatched once a
//! request has already cleared JWT authentication.
//!
//! Binding these methods to an actual JSON-RPC HTTP transport is out of
//! scope (§1, "JSON-RPC HTTP servers... are not specified here") — this
//! crate owns the semantics `reth-rpc-engine-api` implements in the
//! teacher, not its `jsonrpsee` wiring. [`EngineApi`] takes already
//! version-tagged, already-deserialized wire types and returns either a
//! wire-shaped response or an [`EngineApiError`] the (unimplemented)
//! transport layer maps to a JSON-RPC error object via [`EngineApiError::code`].

use std::{fs, io, path::Path};
use std::sync::Arc;

use alloy_consensus::Transaction as _;
use alloy_primitives::{Bytes, B256, U256};
pub use alloy_rpc_types_engine::JwtSecret;
use execution_chain_state::ChainStore;
use execution_chainspec::ChainSpec;
use execution_consensus_beacon::BeaconConsensusEngine;
use execution_engine_primitives::{
    block_to_payload_v1, block_to_payload_v2, built_payload_to_response, payload_status,
    try_payload_v1_to_block, try_payload_v2_to_block, try_payload_v3_to_block,
    EngineGetPayloadResponse, ExecutionPayload, ExecutionPayloadV1, ExecutionPayloadV2,
    ExecutionPayloadV3, ForkchoiceState, PayloadAttributes, PayloadId, PayloadStatus,
};
use execution_evm::execute::{BasicBlockExecutorProvider, BlockExecutionStrategyFactory};
use execution_payload_builder::PayloadBuilderHandle;
use execution_payload_primitives::PayloadBuilderAttributes;
use execution_payload_validator::{
    validate_forkchoice_state, validate_forkchoice_updated_version, validate_payload_attributes,
    validate_payload_version, EngineApiMessageVersion, EngineValidationError,
};
use execution_primitives::SealedBlock;
use execution_revm::VmExecutionEngine;
use execution_storage_api::CanonStateTracker;
use execution_transaction_pool::{PoolAccountReader, PoolTransaction};
use tracing::debug;

/// JSON-RPC error codes this surface can report (§6).
pub mod error_codes {
    /// `-32602`: malformed or semantically-inconsistent request params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// `-32001`: `getPayload` called with an id the builder doesn't hold.
    pub const UNKNOWN_PAYLOAD: i32 = -32001;
    /// `-32002`: a finalized block was given without a safe block.
    pub const INVALID_FORKCHOICE_STATE: i32 = -32002;
    /// `-32003`: payload attributes inconsistent with the active
    /// hardfork, or (reused, per §6) a JWT authentication failure.
    pub const INVALID_PAYLOAD_ATTRIBUTES_OR_AUTH: i32 = -32003;
    /// `-38005`: method version doesn't match the active hardfork.
    pub const UNSUPPORTED_FORK: i32 = -38005;
}

/// Every way a dispatched Engine API call can fail before it produces a
/// wire-level [`PayloadStatus`]/response (§6, §7 "Fork mismatch").
/// Genuine block-validity failures (bad hash, bad state root, ...) are
/// *not* represented here — those are reported as an `Ok(INVALID
/// PayloadStatus)`, per §4.6/§7: `INVALID` is a valid, successful
/// response, not a JSON-RPC error.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// No, or an invalid, JWT bearer token was presented (§6).
    #[error("missing or invalid JWT bearer token")]
    Unauthorized,
    /// Version-gate or forkchoice-state validation failed.
    #[error(transparent)]
    Validation(#[from] EngineValidationError),
    /// `getPayload` was called for an id the builder has no record of.
    #[error("unknown payload id")]
    UnknownPayload,
    /// §4.6 `newPayload` step 3: the number of blob versioned hashes the
    /// caller supplied doesn't match the block's actual blob tx count.
    #[error("payload declares {declared} blob versioned hashes but the call supplied {supplied}")]
    BlobVersionedHashMismatch {
        /// Count computed from the assembled block's transactions.
        declared: usize,
        /// Count the caller passed alongside the payload.
        supplied: usize,
    },
}

impl EngineApiError {
    /// The JSON-RPC error code this maps to (§6).
    pub const fn code(&self) -> i32 {
        match self {
            Self::Unauthorized => error_codes::INVALID_PAYLOAD_ATTRIBUTES_OR_AUTH,
            Self::Validation(EngineValidationError::FinalizedWithoutSafe) => {
                error_codes::INVALID_FORKCHOICE_STATE
            }
            Self::Validation(EngineValidationError::UnsupportedFork { .. }) => {
                error_codes::UNSUPPORTED_FORK
            }
            Self::Validation(
                EngineValidationError::MissingParentBeaconBlockRoot
                | EngineValidationError::MissingWithdrawals
                | EngineValidationError::UnexpectedWithdrawals
                | EngineValidationError::UnexpectedParentBeaconBlockRoot,
            ) => error_codes::INVALID_PAYLOAD_ATTRIBUTES_OR_AUTH,
            Self::UnknownPayload => error_codes::UNKNOWN_PAYLOAD,
            Self::BlobVersionedHashMismatch { .. } => error_codes::INVALID_PARAMS,
        }
    }
}

/// Loads the JWT secret at `path`, generating and persisting a fresh
/// random one if the file doesn't exist yet (§6 "JWT secret file": a
/// 32-byte, 64-hex-char secret, one line, `0x`-prefix optional).
pub fn load_jwt_secret(path: &Path) -> io::Result<JwtSecret> {
    match fs::read_to_string(path) {
        Ok(contents) => JwtSecret::from_hex(contents.trim())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut bytes = [0u8; 32];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
            let hex = alloy_primitives::hex::encode(bytes);
            fs::write(path, &hex)?;
            JwtSecret::from_hex(&hex)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
        }
        Err(err) => Err(err),
    }
}

/// Validates an `Authorization: Bearer <jwt>` header value against
/// `secret` (§6: HS256, `iat` within ±60s of wall clock). Any failure —
/// missing header, wrong scheme, bad signature, stale `iat` — collapses
/// to the single `-32003` outcome the spec prescribes; it does not leak
/// which check failed.
pub fn authenticate(secret: &JwtSecret, authorization_header: Option<&str>) -> Result<(), EngineApiError> {
    let token = authorization_header
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(EngineApiError::Unauthorized)?;
    secret.validate(token).map(|_| ()).map_err(|_| EngineApiError::Unauthorized)
}

/// `{payloadStatus, payloadId?}` (§4.6 `forkchoiceUpdated` return value),
/// the wire shape `engine_forkchoiceUpdated*` reports.
#[derive(Debug, Clone)]
pub struct EngineForkchoiceUpdatedResponse {
    /// The resulting payload status.
    pub payload_status: PayloadStatus,
    /// The payload id of a build started by this call, if attributes
    /// were supplied and a build was in fact started.
    pub payload_id: Option<PayloadId>,
}

/// Type alias matching the concrete `EF` the payload builder is
/// instantiated with throughout this node (mirrors the beacon engine's
/// own alias).
type ExecutorProvider<F> = BasicBlockExecutorProvider<F>;

/// The Engine API surface, wired over the same collaborators as the
/// [`BeaconConsensusEngine`] it delegates the actual sync algorithm to
/// (§4.6 is a thin version-gate-and-dispatch layer in front of §4.5's
/// engine).
pub struct EngineApi<F, T, A>
where
    F: BlockExecutionStrategyFactory,
    T: PoolTransaction,
    A: PoolAccountReader,
{
    chain_spec: Arc<ChainSpec>,
    chain_store: Arc<ChainStore>,
    vm: Arc<VmExecutionEngine<F>>,
    beacon_engine: Arc<BeaconConsensusEngine<F, T, A>>,
    payload_builder: Arc<PayloadBuilderHandle<T, A, ExecutorProvider<F>>>,
    jwt_secret: JwtSecret,
}

impl<F, T, A> EngineApi<F, T, A>
where
    F: BlockExecutionStrategyFactory,
    T: PoolTransaction,
    A: PoolAccountReader,
{
    /// Builds the surface over the node's live collaborators. `vm` and
    /// `payload_builder` are expected to be the exact instances the
    /// `beacon_engine` itself was constructed with, so `getPayload`'s
    /// re-execution (step 2) and the engine's own ancestor walk observe
    /// the same state.
    pub fn new(
        chain_spec: Arc<ChainSpec>,
        chain_store: Arc<ChainStore>,
        vm: Arc<VmExecutionEngine<F>>,
        beacon_engine: Arc<BeaconConsensusEngine<F, T, A>>,
        payload_builder: Arc<PayloadBuilderHandle<T, A, ExecutorProvider<F>>>,
        jwt_secret: JwtSecret,
    ) -> Self {
        Self { chain_spec, chain_store, vm, beacon_engine, payload_builder, jwt_secret }
    }

    /// Authenticates a raw `Authorization` header value against this
    /// surface's JWT secret. Every dispatch method below assumes the
    /// caller has already done this — matching §6's framing of JWT
    /// auth as a property of the Engine JSON-RPC endpoint as a whole,
    /// not of any one method.
    pub fn authenticate(&self, authorization_header: Option<&str>) -> Result<(), EngineApiError> {
        authenticate(&self.jwt_secret, authorization_header)
    }

    /// `engine_newPayloadV1` (pre-Shanghai): no withdrawals, no blobs.
    pub fn new_payload_v1(&self, payload: ExecutionPayloadV1) -> Result<PayloadStatus, EngineApiError> {
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V1, payload.timestamp)?;
        Ok(match try_payload_v1_to_block(payload) {
            Ok(block) => self.beacon_engine.on_new_payload(block),
            Err(_) => payload_status::invalid_block_hash(),
        })
    }

    /// `engine_newPayloadV2` (Shanghai..Cancun): adds withdrawals.
    pub fn new_payload_v2(&self, payload: ExecutionPayloadV2) -> Result<PayloadStatus, EngineApiError> {
        validate_payload_version(
            &self.chain_spec,
            EngineApiMessageVersion::V2,
            payload.payload_inner.timestamp,
        )?;
        Ok(match try_payload_v2_to_block(payload) {
            Ok(block) => self.beacon_engine.on_new_payload(block),
            Err(err) => payload_status::invalid(err.to_string(), B256::ZERO),
        })
    }

    /// `engine_newPayloadV3` (Cancun..Prague): adds blob gas accounting;
    /// validates the blob-versioned-hash count against the block's own
    /// blob transactions (§4.6 step 3).
    pub fn new_payload_v3(
        &self,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, EngineApiError> {
        let timestamp = payload.payload_inner.payload_inner.timestamp;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V3, timestamp)?;
        self.dispatch_blobbed_payload(try_payload_v3_to_block(payload, parent_beacon_block_root), &versioned_hashes)
    }

    /// `engine_newPayloadV4` (Prague onward): same body shape as V3,
    /// plus an EIP-7685 execution-requests list. Requests-hash
    /// verification is a non-goal here (§1: system-contract bytecode is
    /// an external capability), so the list is accepted and not
    /// reconciled against the header.
    pub fn new_payload_v4(
        &self,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
        _execution_requests: Vec<Bytes>,
    ) -> Result<PayloadStatus, EngineApiError> {
        let timestamp = payload.payload_inner.payload_inner.timestamp;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V4, timestamp)?;
        self.dispatch_blobbed_payload(try_payload_v3_to_block(payload, parent_beacon_block_root), &versioned_hashes)
    }

    fn dispatch_blobbed_payload(
        &self,
        converted: Result<SealedBlock, execution_engine_primitives::PayloadConversionError>,
        versioned_hashes: &[B256],
    ) -> Result<PayloadStatus, EngineApiError> {
        let block = match converted {
            Ok(block) => block,
            Err(err) => return Ok(payload_status::invalid(err.to_string(), B256::ZERO)),
        };
        if let Err(err) = validate_blob_versioned_hashes(&block, versioned_hashes) {
            return Ok(payload_status::invalid(err.to_string(), B256::ZERO));
        }
        Ok(self.beacon_engine.on_new_payload(block))
    }

    /// `engine_forkchoiceUpdatedV1` (≤ Paris: no withdrawals, no beacon root).
    pub fn forkchoice_updated_v1(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<EngineForkchoiceUpdatedResponse, EngineApiError> {
        let timestamp = self.gate_timestamp(&attributes);
        validate_forkchoice_updated_version(&self.chain_spec, EngineApiMessageVersion::V1, timestamp, None)?;
        self.dispatch_forkchoice_updated(state, attributes)
    }

    /// `engine_forkchoiceUpdatedV2` (≤ Shanghai, no `parentBeaconBlockRoot`).
    pub fn forkchoice_updated_v2(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<EngineForkchoiceUpdatedResponse, EngineApiError> {
        let timestamp = self.gate_timestamp(&attributes);
        let beacon_root = attributes.as_ref().and_then(|a| a.parent_beacon_block_root);
        validate_forkchoice_updated_version(
            &self.chain_spec,
            EngineApiMessageVersion::V2,
            timestamp,
            beacon_root,
        )?;
        self.dispatch_forkchoice_updated(state, attributes)
    }

    /// `engine_forkchoiceUpdatedV3` (Cancun onward).
    pub fn forkchoice_updated_v3(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<EngineForkchoiceUpdatedResponse, EngineApiError> {
        let timestamp = self.gate_timestamp(&attributes);
        validate_forkchoice_updated_version(&self.chain_spec, EngineApiMessageVersion::V3, timestamp, None)?;
        self.dispatch_forkchoice_updated(state, attributes)
    }

    /// When no payload attributes accompany the call, the version gate
    /// is judged against the current canonical head's timestamp (the
    /// hardfork the chain is actually running), not an attributes
    /// timestamp that doesn't exist.
    fn gate_timestamp(&self, attributes: &Option<PayloadAttributes>) -> u64 {
        attributes.as_ref().map(|a| a.timestamp).unwrap_or_else(|| {
            self.chain_store.canonical_head().map(|b| b.header.timestamp).unwrap_or_default()
        })
    }

    fn dispatch_forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<EngineForkchoiceUpdatedResponse, EngineApiError> {
        validate_forkchoice_state(&state)?;

        let attrs = attributes
            .map(|attrs| {
                validate_payload_attributes(&self.chain_spec, &attrs)?;
                Ok::<_, EngineValidationError>(PayloadBuilderAttributes::new(state.head_block_hash, attrs))
            })
            .transpose()?;

        let outcome = self.beacon_engine.on_forkchoice_updated(state, attrs);
        Ok(EngineForkchoiceUpdatedResponse {
            payload_status: outcome.status,
            payload_id: outcome.payload_id,
        })
    }

    /// `engine_getPayloadV1`.
    pub fn get_payload_v1(&self, id: PayloadId) -> Result<ExecutionPayloadV1, EngineApiError> {
        let built = self.build_and_execute(id)?;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V1, built.block.header.timestamp)?;
        Ok(block_to_payload_v1(&built.block))
    }

    /// `engine_getPayloadV2`.
    pub fn get_payload_v2(&self, id: PayloadId) -> Result<EngineGetPayloadResponse, EngineApiError> {
        let built = self.build_and_execute(id)?;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V2, built.block.header.timestamp)?;
        Ok(EngineGetPayloadResponse {
            execution_payload: ExecutionPayload::V2(block_to_payload_v2(&built.block)),
            block_value: built.fees,
            blobs_bundle: None,
        })
    }

    /// `engine_getPayloadV3`.
    pub fn get_payload_v3(&self, id: PayloadId) -> Result<EngineGetPayloadResponse, EngineApiError> {
        let built = self.build_and_execute(id)?;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V3, built.block.header.timestamp)?;
        Ok(built_payload_to_response(&built))
    }

    /// `engine_getPayloadV4`.
    pub fn get_payload_v4(&self, id: PayloadId) -> Result<EngineGetPayloadResponse, EngineApiError> {
        let built = self.build_and_execute(id)?;
        validate_payload_version(&self.chain_spec, EngineApiMessageVersion::V4, built.block.header.timestamp)?;
        Ok(built_payload_to_response(&built))
    }

    /// `getPayload` steps 1-3: finalize the build, re-execute it through
    /// the VM engine to seed state/receipts under its hash without
    /// touching canonical pointers, then cache it as executed.
    fn build_and_execute(
        &self,
        id: PayloadId,
    ) -> Result<execution_payload_primitives::BuiltPayload, EngineApiError> {
        let built = self
            .payload_builder
            .build(id)
            .map_err(|_| EngineApiError::UnknownPayload)?
            .ok_or(EngineApiError::UnknownPayload)?;

        debug!(target: "engine::service", %id, hash = %built.block.hash(), "sealed payload for getPayload");

        // Precomputed receipts make `run_without_set_head` skip actual
        // re-execution (§4.2), so the total-difficulty argument below is
        // inert for this call.
        let _ = self.vm.run_without_set_head(
            &built.block,
            U256::ZERO,
            Some((*built.receipts).clone()),
            true,
            true,
        );
        self.chain_store.executed_blocks().insert(built.block.hash(), (*built.block).clone());

        Ok(built)
    }
}

/// §4.6 `newPayload` step 3: the number of versioned hashes the caller
/// passed must equal the number the block's own blob transactions
/// declare.
fn validate_blob_versioned_hashes(
    block: &SealedBlock,
    versioned_hashes: &[B256],
) -> Result<(), EngineApiError> {
    let declared: usize = block
        .body
        .transactions
        .iter()
        .filter_map(|tx| tx.blob_versioned_hashes())
        .map(<[_]>::len)
        .sum();
    if declared != versioned_hashes.len() {
        return Err(EngineApiError::BlobVersionedHashMismatch {
            declared,
            supplied: versioned_hashes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_the_spec_table() {
        assert_eq!(EngineApiError::Unauthorized.code(), -32003);
        assert_eq!(EngineApiError::UnknownPayload.code(), -32001);
        assert_eq!(
            EngineApiError::Validation(EngineValidationError::FinalizedWithoutSafe).code(),
            -32002
        );
        assert_eq!(
            EngineApiError::Validation(EngineValidationError::UnsupportedFork {
                method: "newPayloadV1",
                timestamp: 0
            })
            .code(),
            -38005
        );
        assert_eq!(EngineApiError::BlobVersionedHashMismatch { declared: 1, supplied: 0 }.code(), -32602);
    }

    #[test]
    fn authenticate_rejects_a_missing_header() {
        let secret = JwtSecret::random();
        let err = authenticate(&secret, None).unwrap_err();
        assert!(matches!(err, EngineApiError::Unauthorized));
    }

    #[test]
    fn authenticate_rejects_a_non_bearer_header() {
        let secret = JwtSecret::random();
        let err = authenticate(&secret, Some("Basic dXNlcjpwYXNz")).unwrap_err();
        assert!(matches!(err, EngineApiError::Unauthorized));
    }

    #[test]
    fn load_jwt_secret_generates_and_persists_one_when_missing() {
        let dir = std::env::temp_dir().join(format!("execution-core-jwt-test-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jwt.hex");

        let _ = load_jwt_secret(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim().len(), 64);

        // A second load reads the same persisted secret back rather than
        // generating a new one.
        let _ = load_jwt_secret(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);

        fs::remove_dir_all(&dir).ok();
    }
}
