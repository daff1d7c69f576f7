//! Shared header/body checks reusable across concrete [`Consensus`]
//! implementations (§4.1 putBlocks linkage, §4.2 step 6).
//!
//! [`Consensus`]: execution_consensus::Consensus

use alloy_primitives::{Bloom, B256};
use execution_consensus::ConsensusError;
use execution_primitives::{BlockBody, Header, SealedHeader};

/// `header.gasUsed <= header.gasLimit`.
pub fn validate_gas_used(header: &Header) -> Result<(), ConsensusError> {
    if header.gas_used > header.gas_limit {
        return Err(ConsensusError::GasUsedExceedsGasLimit {
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
        });
    }
    Ok(())
}

/// `child.parentHash == parent.hash()` and `child.number == parent.number + 1`.
pub fn validate_against_parent_hash_number(
    header: &SealedHeader,
    parent: &SealedHeader,
) -> Result<(), ConsensusError> {
    if header.parent_hash != parent.hash() {
        return Err(ConsensusError::ParentHashMismatch {
            declared: header.parent_hash,
            actual: parent.hash(),
        });
    }
    if header.number != parent.number + 1 {
        return Err(ConsensusError::ParentBlockNumberMismatch {
            parent_number: parent.number,
            number: header.number,
        });
    }
    Ok(())
}

/// `child.timestamp > parent.timestamp`.
pub fn validate_against_parent_timestamp(
    header: &SealedHeader,
    parent: &SealedHeader,
) -> Result<(), ConsensusError> {
    if header.timestamp <= parent.timestamp {
        return Err(ConsensusError::TimestampIsInPast {
            parent_timestamp: parent.timestamp,
            timestamp: header.timestamp,
        });
    }
    Ok(())
}

/// The header's committed transactions root matches the root computed
/// from the body's transaction list.
pub fn validate_transaction_root(header: &Header, body: &BlockBody) -> Result<(), ConsensusError> {
    let got = execution_primitives::proofs::calculate_transaction_root(&body.transactions);
    if got != header.transactions_root {
        return Err(ConsensusError::BodyTransactionRootDiff { got, expected: header.transactions_root });
    }
    Ok(())
}

/// Withdrawals presence matches the active hardfork, and (if present) the
/// committed withdrawals root matches the body's withdrawal list.
pub fn validate_withdrawals_root(header: &Header, body: &BlockBody) -> Result<(), ConsensusError> {
    match (&body.withdrawals, header.withdrawals_root) {
        (Some(withdrawals), Some(expected)) => {
            let got = execution_primitives::proofs::calculate_withdrawals_root(withdrawals);
            if got != expected {
                return Err(ConsensusError::BodyWithdrawalsRootDiff { got, expected });
            }
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(ConsensusError::WithdrawalsMismatch),
    }
}

/// Ommers must be empty on any block produced under proof of stake.
pub fn validate_ommers_empty_post_merge(body: &BlockBody) -> Result<(), ConsensusError> {
    if !body.ommers.is_empty() {
        return Err(ConsensusError::OmmersNotEmpty);
    }
    Ok(())
}

/// Compares the VM's computed execution outputs against what the header
/// declares (§4.2 step 6): receipts root, logs bloom, gas used, and (if
/// the header carries one) the EIP-7685 requests hash.
pub fn validate_execution_outputs(
    header: &Header,
    receipts_root: B256,
    logs_bloom: Bloom,
    gas_used: u64,
    requests_hash: Option<B256>,
) -> Result<(), execution_execution_errors::BlockValidationError> {
    use execution_execution_errors::BlockValidationError;

    if receipts_root != header.receipts_root {
        return Err(BlockValidationError::ReceiptRootDiff {
            got: Box::new(receipts_root),
            expected: Box::new(header.receipts_root),
        });
    }
    if logs_bloom != header.logs_bloom {
        return Err(BlockValidationError::BloomLogDiff {
            got: Box::new(logs_bloom),
            expected: Box::new(header.logs_bloom),
        });
    }
    if gas_used != header.gas_used {
        return Err(BlockValidationError::BlockGasUsed {
            got: gas_used,
            expected: header.gas_used,
            gas_spent_by_tx: Vec::new(),
        });
    }
    if let Some(expected) = header.requests_hash {
        let got = requests_hash.unwrap_or_default();
        if got != expected {
            return Err(BlockValidationError::RequestsHashDiff {
                got: Box::new(got),
                expected: Box::new(expected),
            });
        }
    }
    Ok(())
}
