//! Mainnet-Ethereum [`Consensus`] rules: the structural and
//! execution-dependent checks a block must pass regardless of which
//! client produced it (§4.1, §4.2 step 6).

use std::sync::Arc;

use alloy_primitives::{Bloom, B256};
use execution_chainspec::ChainSpec;
use execution_consensus::{Consensus, ConsensusError};
use execution_consensus_common::validation::{
    validate_against_parent_hash_number, validate_against_parent_timestamp, validate_gas_used,
    validate_ommers_empty_post_merge, validate_transaction_root, validate_withdrawals_root,
};
use execution_ethereum_forks::Hardfork;
use execution_primitives::{BlockBody, Header, SealedBlock, SealedHeader};

/// Validates blocks against mainnet-Ethereum consensus rules for a given
/// [`ChainSpec`].
#[derive(Debug, Clone)]
pub struct EthereumConsensus {
    chain_spec: Arc<ChainSpec>,
}

impl EthereumConsensus {
    /// Creates a new validator bound to `chain_spec`.
    pub const fn new(chain_spec: Arc<ChainSpec>) -> Self {
        Self { chain_spec }
    }
}

impl Consensus for EthereumConsensus {
    fn validate_header(&self, header: &SealedHeader) -> Result<(), ConsensusError> {
        validate_gas_used(header)?;

        let is_post_london = self.chain_spec.is_london_active_at(header.number, header.timestamp);
        if is_post_london && header.base_fee_per_gas.is_none() {
            return Err(ConsensusError::MissingBaseFee { number: header.number });
        }
        Ok(())
    }

    fn validate_header_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ConsensusError> {
        validate_against_parent_hash_number(header, parent)?;
        validate_against_parent_timestamp(header, parent)?;

        if self.chain_spec.is_london_active_at(header.number, header.timestamp) {
            let expected = execution_chainspec::BaseFeeParams::ETHEREUM.next_block_base_fee(
                parent.gas_used,
                parent.gas_limit,
                parent.base_fee_per_gas.unwrap_or_default(),
            );
            let got = header.base_fee_per_gas.unwrap_or_default();
            if got != expected {
                return Err(ConsensusError::BaseFeeDiff { got, expected });
            }
        }
        Ok(())
    }

    fn validate_block_pre_execution(&self, block: &SealedBlock) -> Result<(), ConsensusError> {
        validate_transaction_root(&block.header, &block.body)?;
        validate_withdrawals_root(&block.header, &block.body)?;

        if self.chain_spec.is_fork_active_at(Hardfork::Paris, block.number(), block.header.timestamp)
        {
            validate_ommers_empty_post_merge(&block.body)?;
        }
        Ok(())
    }

    fn validate_block_post_execution(
        &self,
        header: &Header,
        _body: &BlockBody,
        receipts_root: B256,
        logs_bloom: Bloom,
        gas_used: u64,
        requests_hash: Option<B256>,
    ) -> Result<(), ConsensusError> {
        execution_consensus_common::validation::validate_execution_outputs(
            header,
            receipts_root,
            logs_bloom,
            gas_used,
            requests_hash,
        )
        .map_err(|err| {
            tracing::debug!(target: "consensus::ethereum", %err, "post-execution validation failed");
            ConsensusError::from(err)
        })
    }
}
