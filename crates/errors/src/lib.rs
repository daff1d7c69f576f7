//! Top-level error aggregate: every subsystem's error type folded into
//! one `ExecutionError` so call sites that cross subsystem boundaries
//! (e.g. the engine service driving both consensus validation and VM
//! execution) don't need to hand-roll a wrapper enum of their own.

use execution_consensus::ConsensusError;
use execution_execution_errors::{BlockExecutionError, BlockValidationError};
use execution_storage_errors::ProviderError;

/// Any error this core's subsystems can produce, folded into one type.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A consensus rule was violated.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// Block execution failed.
    #[error(transparent)]
    Execution(#[from] BlockExecutionError),

    /// A standalone validation error not tied to a specific execution
    /// attempt (e.g. pre-execution header checks).
    #[error(transparent)]
    Validation(#[from] BlockValidationError),

    /// The chain store's persistence boundary reported a failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ExecutionError {
    /// Whether this error represents unrecoverable corruption rather
    /// than a rejected write or a permanently invalid block (§7 "Fatal
    /// system" vs. "Permanent validation").
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_fatal())
    }
}

/// Convenience alias for the chain store's read/write boundary.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Convenience alias for operations that can fail anywhere in the stack.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_propagates_fatality() {
        let err = ExecutionError::from(ProviderError::Database("disk full".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn consensus_error_is_not_fatal() {
        let err = ExecutionError::from(ConsensusError::GasUsedExceedsGasLimit { gas_used: 1, gas_limit: 0 });
        assert!(!err.is_fatal());
    }
}
