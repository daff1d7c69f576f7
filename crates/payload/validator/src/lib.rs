//! Version-gate and attribute validation for the Engine API (§4.6): which
//! `newPayload`/`forkchoiceUpdated`/`getPayload` version a request is legal
//! under, given the hardfork active at its timestamp, plus the payload
//! attribute and forkchoice-state sanity checks that precede dispatch.

use alloy_primitives::B256;
use execution_chainspec::ChainSpec;
use execution_engine_primitives::{ForkchoiceState, PayloadAttributes};
use execution_ethereum_forks::Hardfork;

/// Which `newPayload`/`forkchoiceUpdated`/`getPayload` version a request
/// arrived as. `getPayload` reuses the `newPayload` ranges (§4.6
/// "getPayloadV1..V5 | matches newPayload ranges"); this repo only
/// implements up to the Prague boundary (V4), since Osaka has no
/// scheduled activation (`Hardfork::Osaka` is `ForkCondition::Never` on
/// every chain spec this repo ships).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineApiMessageVersion {
    /// Pre-Shanghai.
    V1,
    /// Shanghai..before Cancun.
    V2,
    /// Cancun..before Prague.
    V3,
    /// Prague..before Osaka.
    V4,
}

/// Failures raised by version-gate or attribute validation. The Engine
/// API surface maps these to `UNSUPPORTED_FORK` (-38005) or
/// `INVALID_PARAMS` (-32602), per §6/§7.
#[derive(Debug, thiserror::Error)]
pub enum EngineValidationError {
    /// The method version doesn't match the hardfork active at the given
    /// timestamp (§4.6 version gate table).
    #[error("{method} is not valid for the hardfork active at timestamp {timestamp}")]
    UnsupportedFork {
        /// The Engine API method name, e.g. `"engine_newPayloadV2"`.
        method: &'static str,
        /// The payload/forkchoice timestamp that was checked.
        timestamp: u64,
    },
    /// `forkchoiceUpdatedV2` was called with a `parentBeaconBlockRoot`,
    /// which only exists from V3 onward.
    #[error("forkchoiceUpdatedV2 does not accept parentBeaconBlockRoot")]
    UnexpectedParentBeaconBlockRoot,
    /// Cancun+ payload attributes must carry `parentBeaconBlockRoot`.
    #[error("payload attributes require parentBeaconBlockRoot from Cancun onward")]
    MissingParentBeaconBlockRoot,
    /// Shanghai+ payload attributes must carry `withdrawals`.
    #[error("payload attributes require withdrawals from Shanghai onward")]
    MissingWithdrawals,
    /// Pre-Shanghai payload attributes must not carry `withdrawals`.
    #[error("withdrawals are not valid before Shanghai")]
    UnexpectedWithdrawals,
    /// §4.6 `forkchoiceUpdated` step 1: `finalized != 0` requires `safe != 0`.
    #[error("invalid forkchoice state: a finalized block requires a safe block")]
    FinalizedWithoutSafe,
}

fn is_osaka_active(chain_spec: &ChainSpec, timestamp: u64) -> bool {
    chain_spec.is_fork_active_at(Hardfork::Osaka, u64::MAX, timestamp)
}

/// Validates a `newPayload`/`getPayload` request's version against the
/// hardfork active at `timestamp` (§4.6 version gate table, `newPayload`
/// row; `getPayload` reuses it unchanged).
pub fn validate_payload_version(
    chain_spec: &ChainSpec,
    version: EngineApiMessageVersion,
    timestamp: u64,
) -> Result<(), EngineValidationError> {
    let shanghai = chain_spec.is_shanghai_active_at_timestamp(timestamp);
    let cancun = chain_spec.is_cancun_active_at_timestamp(timestamp);
    let prague = chain_spec.is_prague_active_at_timestamp(timestamp);
    let osaka = is_osaka_active(chain_spec, timestamp);

    let (method, ok) = match version {
        EngineApiMessageVersion::V1 => ("newPayloadV1", !shanghai),
        EngineApiMessageVersion::V2 => ("newPayloadV2", !cancun),
        EngineApiMessageVersion::V3 => ("newPayloadV3", cancun && !prague),
        EngineApiMessageVersion::V4 => ("newPayloadV4", prague && !osaka),
    };

    if ok {
        Ok(())
    } else {
        Err(EngineValidationError::UnsupportedFork { method, timestamp })
    }
}

/// Validates a `forkchoiceUpdated` request's version against the
/// hardfork active at `timestamp` and, for V2, that no
/// `parentBeaconBlockRoot` was supplied (§4.6 version gate table,
/// `forkchoiceUpdated` row).
pub fn validate_forkchoice_updated_version(
    chain_spec: &ChainSpec,
    version: EngineApiMessageVersion,
    timestamp: u64,
    parent_beacon_block_root: Option<B256>,
) -> Result<(), EngineValidationError> {
    let shanghai = chain_spec.is_shanghai_active_at_timestamp(timestamp);
    let cancun = chain_spec.is_cancun_active_at_timestamp(timestamp);

    match version {
        EngineApiMessageVersion::V1 if shanghai => Err(EngineValidationError::UnsupportedFork {
            method: "forkchoiceUpdatedV1",
            timestamp,
        }),
        EngineApiMessageVersion::V2 if cancun => Err(EngineValidationError::UnsupportedFork {
            method: "forkchoiceUpdatedV2",
            timestamp,
        }),
        EngineApiMessageVersion::V2 if parent_beacon_block_root.is_some() => {
            Err(EngineValidationError::UnexpectedParentBeaconBlockRoot)
        }
        EngineApiMessageVersion::V3 | EngineApiMessageVersion::V4 if !cancun => {
            Err(EngineValidationError::UnsupportedFork { method: "forkchoiceUpdatedV3", timestamp })
        }
        _ => Ok(()),
    }
}

/// Validates payload build attributes against the hardfork active at
/// their timestamp: withdrawals required from Shanghai, forbidden
/// before it; `parentBeaconBlockRoot` required from Cancun (§4.6
/// `forkchoiceUpdated` step 7, §4.4 attribute intake).
pub fn validate_payload_attributes(
    chain_spec: &ChainSpec,
    attributes: &PayloadAttributes,
) -> Result<(), EngineValidationError> {
    let shanghai = chain_spec.is_shanghai_active_at_timestamp(attributes.timestamp);
    let cancun = chain_spec.is_cancun_active_at_timestamp(attributes.timestamp);

    match (shanghai, attributes.withdrawals.is_some()) {
        (true, false) => return Err(EngineValidationError::MissingWithdrawals),
        (false, true) => return Err(EngineValidationError::UnexpectedWithdrawals),
        _ => {}
    }

    if cancun && attributes.parent_beacon_block_root.is_none() {
        return Err(EngineValidationError::MissingParentBeaconBlockRoot);
    }

    Ok(())
}

/// Validates a forkchoice state's internal consistency (§4.6
/// `forkchoiceUpdated` step 1): a finalized block implies a safe block.
pub fn validate_forkchoice_state(
    state: &ForkchoiceState,
) -> Result<(), EngineValidationError> {
    if state.finalized_block_hash != B256::ZERO && state.safe_block_hash == B256::ZERO {
        return Err(EngineValidationError::FinalizedWithoutSafe);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_chainspec::MAINNET;

    #[test]
    fn new_payload_v1_rejected_post_shanghai() {
        let shanghai_ts = 1_681_338_455;
        let err =
            validate_payload_version(&MAINNET, EngineApiMessageVersion::V1, shanghai_ts)
                .unwrap_err();
        assert!(matches!(err, EngineValidationError::UnsupportedFork { .. }));
    }

    #[test]
    fn new_payload_v2_accepted_pre_cancun() {
        let shanghai_ts = 1_681_338_455;
        assert!(validate_payload_version(&MAINNET, EngineApiMessageVersion::V2, shanghai_ts)
            .is_ok());
    }

    #[test]
    fn new_payload_v3_requires_cancun_active() {
        let pre_cancun_ts = 1_681_338_455;
        let err =
            validate_payload_version(&MAINNET, EngineApiMessageVersion::V3, pre_cancun_ts)
                .unwrap_err();
        assert!(matches!(err, EngineValidationError::UnsupportedFork { .. }));
    }

    #[test]
    fn forkchoice_v2_rejects_parent_beacon_block_root() {
        let shanghai_ts = 1_681_338_455;
        let err = validate_forkchoice_updated_version(
            &MAINNET,
            EngineApiMessageVersion::V2,
            shanghai_ts,
            Some(B256::repeat_byte(1)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineValidationError::UnexpectedParentBeaconBlockRoot));
    }

    #[test]
    fn forkchoice_state_requires_safe_before_finalized() {
        let state = ForkchoiceState {
            head_block_hash: B256::repeat_byte(1),
            safe_block_hash: B256::ZERO,
            finalized_block_hash: B256::repeat_byte(2),
        };
        let err = validate_forkchoice_state(&state).unwrap_err();
        assert!(matches!(err, EngineValidationError::FinalizedWithoutSafe));
    }
}
