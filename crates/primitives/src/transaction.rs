//! Transaction types.
//!
//! Rather than redefine the per-type-byte transaction bodies (legacy,
//! EIP-2930, EIP-1559, EIP-4844, EIP-7702), this module builds on
//! [`alloy_consensus::TxEnvelope`], which already carries the signature and
//! knows how to compute its own type byte and RLP encoding. What this
//! module adds is the sender-recovery bookkeeping the chain store, pool and
//! VM execution engine all need: a transaction paired with its recovered
//! signer, and size/blob helpers used by gas accounting and sidecar
//! indexing.

use alloy_consensus::transaction::SignerRecoverable;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256};

/// The outer type byte of a transaction (legacy, EIP-2930, EIP-1559, ...).
pub type TxType = alloy_consensus::TxType;

/// A signed transaction in its wire/RLP-serializable envelope form.
pub type TransactionSigned = alloy_consensus::TxEnvelope;

/// The inner, type-specific transaction payload. Kept as a type alias
/// rather than a fresh enum so EIP additions only require a bump of
/// `alloy-consensus`.
pub type Transaction = alloy_consensus::TxEnvelope;

/// A [`TransactionSigned`] together with the address that signed it.
///
/// Recovering the sender from an ECDSA signature is one of the more
/// expensive steps on the ingestion and execution path (§1), so pool
/// and VM code pass this type around rather than recovering repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSignedEcRecovered {
    transaction: TransactionSigned,
    signer: Address,
}

impl TransactionSignedEcRecovered {
    /// Pairs a transaction with an already-known signer.
    ///
    /// Callers are responsible for `signer` actually matching the
    /// transaction's signature; used once a signature has already been
    /// checked (e.g. on a block accepted from the VM execution engine).
    pub const fn from_signed_transaction(transaction: TransactionSigned, signer: Address) -> Self {
        Self { transaction, signer }
    }

    /// The recovered signer.
    pub const fn signer(&self) -> Address {
        self.signer
    }

    /// Borrows the inner signed transaction.
    pub const fn transaction(&self) -> &TransactionSigned {
        &self.transaction
    }

    /// Splits this value back into its parts.
    pub fn split(self) -> (TransactionSigned, Address) {
        (self.transaction, self.signer)
    }

    /// The transaction's hash.
    pub fn hash(&self) -> B256 {
        *self.transaction.tx_hash()
    }
}

/// Recovers the signer of a single transaction.
///
/// This is the non-batched slow path; [`recover_signers`] should be
/// preferred for whole block bodies so callers can parallelize if they
/// choose to.
pub fn recover_signer(tx: &TransactionSigned) -> Option<Address> {
    tx.recover_signer().ok()
}

/// Recovers the signer of every transaction in `txs`, in order.
///
/// Returns `None` as soon as any single recovery fails, mirroring the
/// all-or-nothing semantics a block body's sender list needs: a block
/// with even one unrecoverable signature cannot be executed.
pub fn recover_signers<'a>(
    txs: impl IntoIterator<Item = &'a TransactionSigned>,
) -> Option<Vec<Address>> {
    txs.into_iter().map(recover_signer).collect()
}

/// Whether a transaction carries an EIP-4844 blob commitment.
pub fn is_eip4844(tx: &TransactionSigned) -> bool {
    matches!(tx, alloy_consensus::TxEnvelope::Eip4844(_))
}

/// A rough heuristic for a transaction's in-memory footprint, used by the
/// pool's `maxSize` / per-account eviction bookkeeping.
pub fn size(tx: &TransactionSigned) -> usize {
    tx.encode_2718_len()
}
