//! The mainnet-Ethereum [`BlockExecutionStrategy`] (§4.2 steps 4-6):
//! replays a sealed block's transactions against a revm [`State`],
//! applying the pre- and post-execution system operations in
//! [`crate::state_change`].
//!
//! Grounded on the teacher's `revm-executor::processor::EVMProcessor`,
//! rewritten against the modern `revm::Evm` builder API already used by
//! `execution-evm`'s [`ConfigureEvm`] rather than the teacher's retired
//! `StateDBBox`/`EVM` pair.

use std::sync::Arc;

use alloy_consensus::Transaction as _;
use execution_chainspec::ChainSpec;
use execution_evm::{execute::BlockExecutionStrategy, ConfigureEvm, EthEvmConfig};
use execution_execution_errors::{BlockExecutionError, BlockValidationError};
use execution_execution_types::BlockExecutionInput;
use execution_primitives::{Receipt, Request};
use execution_storage_errors::ProviderError;
use revm::{db::BundleState, Database};
use revm_primitives::{ExecutionResult, ResultAndState};

use crate::state_change;

/// Factory producing one [`EthExecutionStrategy`] per block, bound to the
/// mainnet chain spec and a revm `SpecId` derived from it.
#[derive(Debug, Clone)]
pub struct EthExecutionStrategyFactory {
    evm_config: EthEvmConfig,
}

impl EthExecutionStrategyFactory {
    /// Creates a factory for `chain_spec`.
    pub fn new(chain_spec: Arc<ChainSpec>) -> Self {
        Self { evm_config: EthEvmConfig::new(chain_spec) }
    }
}

impl execution_evm::execute::BlockExecutionStrategyFactory for EthExecutionStrategyFactory {
    type Strategy<DB: Database<Error: Into<ProviderError> + core::fmt::Display>> =
        EthExecutionStrategy<DB>;

    fn create_strategy<DB>(&self, db: DB) -> Self::Strategy<DB>
    where
        DB: Database<Error: Into<ProviderError> + core::fmt::Display>,
    {
        EthExecutionStrategy {
            state: revm::db::State::builder().with_database(db).with_bundle_update().build(),
            evm_config: self.evm_config.clone(),
        }
    }
}

/// Replays one block's transactions and post-block system operations
/// against a revm `State<DB>` (§4.2 "Algorithm — single-block
/// execution", steps 4-6).
#[derive(Debug)]
pub struct EthExecutionStrategy<DB> {
    state: revm::db::State<DB>,
    evm_config: EthEvmConfig,
}

impl<DB> BlockExecutionStrategy<DB> for EthExecutionStrategy<DB>
where
    DB: Database<Error: Into<ProviderError> + core::fmt::Display>,
{
    type Error = BlockExecutionError;

    fn apply_pre_execution_changes(
        &mut self,
        input: &BlockExecutionInput<'_>,
    ) -> Result<(), Self::Error> {
        let header = input.block.header.header();
        let spec_id = execution_evm::configure::spec_id_at(self.evm_config.chain_spec(), header);

        let env = self.evm_config.env_for_block(header, input.total_difficulty);
        let mut evm = self.evm_config.evm_with_env(&mut self.state, env);

        state_change::apply_beacon_root_contract_call(
            spec_id,
            header.parent_beacon_block_root,
            header.number,
            header.timestamp,
            &mut evm,
        )
        .map_err(BlockExecutionError::Validation)
    }

    fn execute_transactions(
        &mut self,
        input: &BlockExecutionInput<'_>,
    ) -> Result<(Vec<Receipt>, u64), Self::Error> {
        let header = input.block.header.header();
        let env = self.evm_config.env_for_block(header, input.total_difficulty);

        let senders = input.block.senders().ok_or(BlockExecutionError::Validation(
            BlockValidationError::SenderRecoveryError,
        ))?;

        let mut evm = self.evm_config.evm_with_env(&mut self.state, env);

        let mut cumulative_gas_used = 0u64;
        let mut receipts = Vec::with_capacity(input.block.body.transactions.len());

        for (transaction, sender) in input.block.body.transactions.iter().zip(senders.iter()) {
            let block_available_gas = header.gas_limit - cumulative_gas_used;
            if transaction.gas_limit() > block_available_gas {
                return Err(BlockValidationError::TransactionGasLimitMoreThanAvailableBlockGas {
                    transaction_gas_limit: transaction.gas_limit(),
                    block_available_gas,
                }
                .into());
            }

            self.evm_config.fill_tx_env(&mut evm.context.evm.env.tx, transaction, *sender);

            let ResultAndState { result, state } = evm.transact().map_err(|err| {
                BlockValidationError::EVM {
                    hash: *transaction.tx_hash(),
                    error: Box::new(err.map_db_err(|e| e.into().to_string())),
                }
            })?;
            evm.context.evm.db.commit(state);

            cumulative_gas_used += result.gas_used();
            receipts.push(receipt_from_result(transaction.tx_type(), cumulative_gas_used, result));
        }

        Ok((receipts, cumulative_gas_used))
    }

    fn execute_transaction(
        &mut self,
        header: &alloy_consensus::Header,
        total_difficulty: U256,
        cumulative_gas_used: u64,
        transaction: &execution_primitives::TransactionSigned,
        sender: alloy_primitives::Address,
    ) -> Result<(Receipt, u64), Self::Error> {
        let block_available_gas = header.gas_limit.saturating_sub(cumulative_gas_used);
        if transaction.gas_limit() > block_available_gas {
            return Err(BlockValidationError::TransactionGasLimitMoreThanAvailableBlockGas {
                transaction_gas_limit: transaction.gas_limit(),
                block_available_gas,
            }
            .into());
        }

        let env = self.evm_config.env_for_block(header, total_difficulty);
        let mut evm = self.evm_config.evm_with_env(&mut self.state, env);
        self.evm_config.fill_tx_env(&mut evm.context.evm.env.tx, transaction, sender);

        let ResultAndState { result, state } = evm.transact().map_err(|err| BlockValidationError::EVM {
            hash: *transaction.tx_hash(),
            error: Box::new(err.map_db_err(|e| e.into().to_string())),
        })?;
        let gas_used = result.gas_used();
        evm.context.evm.db.commit(state);

        let receipt =
            receipt_from_result(transaction.tx_type(), cumulative_gas_used + gas_used, result);
        Ok((receipt, gas_used))
    }

    fn apply_post_execution_changes(
        &mut self,
        input: &BlockExecutionInput<'_>,
        _receipts: &[Receipt],
    ) -> Result<Vec<Request>, Self::Error> {
        let header = input.block.header.header();
        let spec_id = execution_evm::configure::spec_id_at(self.evm_config.chain_spec(), header);

        state_change::post_block_balance_increments(&mut self.state, spec_id, header.beneficiary)
            .map_err(BlockExecutionError::Validation)?;

        if let Some(withdrawals) = &input.block.body.withdrawals {
            state_change::insert_post_block_withdrawals_balance_increments(
                &mut self.state,
                withdrawals,
            )
            .map_err(BlockExecutionError::Validation)?;
        }

        Ok(state_change::extract_requests_placeholder(header))
    }

    fn finish(&mut self) -> BundleState {
        self.state.merge_transitions(revm::db::states::bundle_state::BundleRetention::Reverts);
        self.state.take_bundle()
    }
}

fn receipt_from_result(tx_type: alloy_consensus::TxType, cumulative_gas_used: u64, result: ExecutionResult) -> Receipt {
    let success = result.is_success();
    let logs = result.into_logs();
    let receipt = alloy_consensus::Receipt {
        status: success.into(),
        cumulative_gas_used,
        logs,
    };
    let with_bloom = receipt.with_bloom();

    match tx_type {
        alloy_consensus::TxType::Legacy => Receipt::Legacy(with_bloom),
        alloy_consensus::TxType::Eip2930 => Receipt::Eip2930(with_bloom),
        alloy_consensus::TxType::Eip1559 => Receipt::Eip1559(with_bloom),
        alloy_consensus::TxType::Eip4844 => Receipt::Eip4844(with_bloom),
        alloy_consensus::TxType::Eip7702 => Receipt::Eip7702(with_bloom),
    }
}
