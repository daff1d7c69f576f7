//! Pool error taxonomy (§4.3 `add()`): structural/cryptographic faults
//! are permanent (`InvalidTransaction`), nonce/balance faults are
//! recoverable and carry enough detail for a caller to retry later.

use alloy_primitives::{Address, TxHash, U256};

/// Top-level failure from a pool operation.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The transaction is already present in the pool, keyed by hash.
    #[error("transaction {0} is already known")]
    AlreadyKnown(TxHash),

    /// Structural, cryptographic, or semantic validation failed.
    #[error(transparent)]
    InvalidTransaction(#[from] InvalidPoolTransactionError),

    /// A same-`(sender, nonce)` resubmission did not clear the
    /// configured price-bump threshold over the entry it would replace.
    #[error(
        "replacement transaction for sender {sender} nonce {nonce} underpriced: \
         needs at least {required_fee} per gas, got {given_fee}"
    )]
    ReplacementUnderpriced { sender: Address, nonce: u64, required_fee: u128, given_fee: u128 },

    /// The pool is at a configured capacity limit and this transaction
    /// did not out-bid the cheapest entry eligible for eviction.
    #[error("transaction pool is full")]
    PoolOverflow,

    /// No entry exists for the requested hash.
    #[error("transaction {0} not found in pool")]
    TransactionNotFound(TxHash),
}

/// Why a single transaction failed the `add()` validation pipeline
/// (§4.3: "validates signature, chain id, intrinsic gas, initial
/// balance sufficiency, replay-protection rules ..., blob count ...,
/// sidecar presence").
#[derive(Debug, thiserror::Error)]
pub enum InvalidPoolTransactionError {
    /// The transaction's signature does not recover to a valid sender.
    #[error("invalid transaction signature")]
    InvalidSignature,

    /// The transaction was signed for a different chain.
    #[error("signed for chain {got:?}, this network is chain {expected}")]
    ChainIdMismatch { expected: u64, got: Option<u64> },

    /// `gas_limit` is below the transaction's own intrinsic gas cost.
    #[error("intrinsic gas cost {required} exceeds gas limit {gas_limit}")]
    IntrinsicGasExceeded { required: u64, gas_limit: u64 },

    /// The transaction's nonce is behind the sender's current account
    /// nonce, so it can never become valid by waiting.
    #[error("nonce {tx_nonce} is below account nonce {account_nonce}")]
    NonceTooLow { tx_nonce: u64, account_nonce: u64 },

    /// The sender's current balance cannot cover `value + fee * gas_limit`.
    #[error("sender balance {balance} insufficient for cost {cost}")]
    InsufficientBalance { balance: U256, cost: U256 },

    /// A 4844 transaction's blob count exceeds the per-block cap.
    #[error("blob count {count} exceeds per-block cap {max}")]
    BlobCountExceeded { count: usize, max: usize },

    /// A 4844 transaction arrived over the network wrapper without its
    /// matching blob sidecar.
    #[error("eip-4844 transaction is missing its blob sidecar")]
    MissingBlobSidecar,

    /// The transaction's RLP-encoded size exceeds the configured cap.
    #[error("encoded size {size} exceeds cap {max}")]
    Oversized { size: usize, max: usize },
}

/// Convenience alias matching the rest of the pool's `Result` returns.
pub type PoolResult<T> = Result<T, PoolError>;
