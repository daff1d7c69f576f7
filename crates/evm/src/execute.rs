//! The trait boundary between the VM execution engine and a concrete revm
//! wiring (§4.2 "single-block execution"). This crate defines the shape;
//! `execution-revm` supplies the mainnet-Ethereum strategy that fills it.

use alloy_consensus::Header;
use alloy_primitives::{Address, U256};
use execution_execution_errors::BlockExecutionError;
use execution_execution_types::{BlockExecutionInput, BlockExecutionOutput};
use execution_primitives::{Receipt, TransactionSigned};
use execution_storage_errors::ProviderError;
use revm::Database;

/// Executes a single block against a [`Database`], producing state
/// changes, receipts, and extracted requests.
///
/// An `Executor` is single-use: it is built for one block (or, via
/// [`BatchExecutor`], one contiguous run of blocks) and consumed by
/// `execute`.
pub trait Executor<DB> {
    /// The per-transaction receipt type this executor produces.
    type Output;
    /// The error type raised by execution.
    type Error;

    /// Replays every transaction in `input.block`, applies post-block
    /// system operations, and returns the resulting state diff without
    /// comparing it against the header — that comparison is the caller's
    /// job (§4.2 step 6), since only the caller has the expected values.
    fn execute(self, input: BlockExecutionInput<'_>) -> Result<Self::Output, Self::Error>;

    /// Runs the pre-execution system changes once, up front — the
    /// incremental counterpart to [`execute`](Self::execute) used by
    /// pending-block assembly (§4.4), which decides transaction
    /// inclusion one at a time rather than replaying an already-assembled
    /// block.
    fn open_block(&mut self, input: &BlockExecutionInput<'_>) -> Result<(), Self::Error>;

    /// Attempts one transaction against the state opened by
    /// [`open_block`](Self::open_block), returning its receipt and gas
    /// used. Does not enforce the block's declared gas limit — the
    /// caller decides per transaction whether a gas or blob cap was hit
    /// and whether to keep trying this sender's next nonce.
    fn execute_transaction(
        &mut self,
        header: &Header,
        total_difficulty: U256,
        cumulative_gas_used: u64,
        transaction: &TransactionSigned,
        sender: Address,
    ) -> Result<(Receipt, u64), Self::Error>;

    /// Runs post-execution system changes and finalizes the state diff
    /// accumulated by `open_block`/`execute_transaction` calls.
    fn finish_block(
        &mut self,
        input: &BlockExecutionInput<'_>,
        receipts: &[Receipt],
    ) -> Result<(Vec<execution_primitives::Request>, revm::db::BundleState), Self::Error>;
}

/// Factory for [`Executor`] instances bound to a particular `DB`.
pub trait BlockExecutorProvider: Clone + Send + Sync + Unpin + 'static {
    /// The concrete executor type for a given database.
    type Executor<DB: Database<Error: Into<ProviderError> + core::fmt::Display>>: Executor<
        DB,
        Output = BlockExecutionOutput<Receipt>,
        Error = BlockExecutionError,
    >;

    /// Builds an executor over `db`.
    fn executor<DB>(&self, db: DB) -> Self::Executor<DB>
    where
        DB: Database<Error: Into<ProviderError> + core::fmt::Display>;
}

/// The three phases of replaying one block against a revm `State`,
/// decomposed so a concrete strategy can be swapped without touching the
/// driving loop in [`BasicBlockExecutorProvider`].
pub trait BlockExecutionStrategy<DB> {
    /// Error type for all three phases.
    type Error: From<ProviderError>;

    /// System-level state writes that happen before any transaction runs
    /// (EIP-4788 beacon root storage).
    fn apply_pre_execution_changes(
        &mut self,
        input: &BlockExecutionInput<'_>,
    ) -> Result<(), Self::Error>;

    /// Replays every transaction in order, returning one receipt each and
    /// the cumulative gas used.
    fn execute_transactions(
        &mut self,
        input: &BlockExecutionInput<'_>,
    ) -> Result<(Vec<Receipt>, u64), Self::Error>;

    /// Executes one transaction against the state already opened by
    /// [`apply_pre_execution_changes`](Self::apply_pre_execution_changes),
    /// for incremental callers that decide gas/blob admission themselves
    /// (§4.4) rather than replaying a whole pre-assembled block.
    fn execute_transaction(
        &mut self,
        header: &Header,
        total_difficulty: U256,
        cumulative_gas_used: u64,
        transaction: &TransactionSigned,
        sender: Address,
    ) -> Result<(Receipt, u64), Self::Error>;

    /// System-level state writes that happen after every transaction has
    /// run (block rewards, withdrawals, EIP-7685 request extraction).
    fn apply_post_execution_changes(
        &mut self,
        input: &BlockExecutionInput<'_>,
        receipts: &[Receipt],
    ) -> Result<Vec<execution_primitives::Request>, Self::Error>;

    /// Finalizes the bundle state accumulated across the three phases.
    fn finish(&mut self) -> revm::db::BundleState;
}

/// Factory for a [`BlockExecutionStrategy`] bound to a particular `DB`.
pub trait BlockExecutionStrategyFactory: Clone + Send + Sync + Unpin + 'static {
    /// The concrete strategy type for a given database.
    type Strategy<DB: Database<Error: Into<ProviderError> + core::fmt::Display>>: BlockExecutionStrategy<
        DB,
        Error = BlockExecutionError,
    >;

    /// Builds a strategy over `db`.
    fn create_strategy<DB>(&self, db: DB) -> Self::Strategy<DB>
    where
        DB: Database<Error: Into<ProviderError> + core::fmt::Display>;
}

/// A [`BlockExecutorProvider`] built generically over any
/// [`BlockExecutionStrategyFactory`] — the strategy does the chain-specific
/// work, this just drives execute → collect gas_used → finish.
#[derive(Debug, Clone)]
pub struct BasicBlockExecutorProvider<F> {
    strategy_factory: F,
}

impl<F> BasicBlockExecutorProvider<F> {
    /// Creates a provider backed by `strategy_factory`.
    pub const fn new(strategy_factory: F) -> Self {
        Self { strategy_factory }
    }
}

impl<F> BlockExecutorProvider for BasicBlockExecutorProvider<F>
where
    F: BlockExecutionStrategyFactory,
{
    type Executor<DB: Database<Error: Into<ProviderError> + core::fmt::Display>> =
        BasicBlockExecutor<F::Strategy<DB>>;

    fn executor<DB>(&self, db: DB) -> Self::Executor<DB>
    where
        DB: Database<Error: Into<ProviderError> + core::fmt::Display>,
    {
        BasicBlockExecutor { strategy: self.strategy_factory.create_strategy(db) }
    }
}

/// The [`Executor`] driven by a [`BlockExecutionStrategy`].
#[derive(Debug)]
pub struct BasicBlockExecutor<S> {
    strategy: S,
}

impl<DB, S> Executor<DB> for BasicBlockExecutor<S>
where
    S: BlockExecutionStrategy<DB, Error = BlockExecutionError>,
{
    type Output = BlockExecutionOutput<Receipt>;
    type Error = BlockExecutionError;

    fn execute(mut self, input: BlockExecutionInput<'_>) -> Result<Self::Output, Self::Error> {
        self.strategy.apply_pre_execution_changes(&input)?;
        let (mut receipts, mut gas_used) = self.strategy.execute_transactions(&input)?;
        let _ = &mut receipts;
        let _ = &mut gas_used;
        let requests = self.strategy.apply_post_execution_changes(&input, &receipts)?;
        let state = self.strategy.finish();

        Ok(BlockExecutionOutput { state, receipts, requests, gas_used })
    }

    fn open_block(&mut self, input: &BlockExecutionInput<'_>) -> Result<(), Self::Error> {
        self.strategy.apply_pre_execution_changes(input)
    }

    fn execute_transaction(
        &mut self,
        header: &Header,
        total_difficulty: U256,
        cumulative_gas_used: u64,
        transaction: &TransactionSigned,
        sender: Address,
    ) -> Result<(Receipt, u64), Self::Error> {
        self.strategy.execute_transaction(header, total_difficulty, cumulative_gas_used, transaction, sender)
    }

    fn finish_block(
        &mut self,
        input: &BlockExecutionInput<'_>,
        receipts: &[Receipt],
    ) -> Result<(Vec<execution_primitives::Request>, revm::db::BundleState), Self::Error> {
        let requests = self.strategy.apply_post_execution_changes(input, receipts)?;
        let state = self.strategy.finish();
        Ok((requests, state))
    }
}

/// Convenience wrapper matching the teacher's `(block, total_difficulty)`
/// shorthand for constructing execution inputs.
pub fn input_from<'a>(
    block: &'a execution_primitives::SealedBlock,
    total_difficulty: U256,
) -> BlockExecutionInput<'a> {
    BlockExecutionInput::new(block, total_difficulty, None)
}
