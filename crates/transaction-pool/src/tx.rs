//! The unit of pool currency: a recovered transaction plus the derived
//! fields the pool's ordering and validation need on every access
//! (§4.3). [`PoolTransaction`] is the seam a block builder or a test
//! fixture can implement against instead of the concrete
//! [`EthPooledTransaction`], the way the teacher keeps `PoolTransaction`
//! generic over the concrete envelope type.

use alloy_consensus::Transaction as _;
use alloy_primitives::{Address, TxHash, B256, U256};
use execution_primitives::TransactionSignedEcRecovered;
use execution_primitives_traits::constants::MIN_TRANSACTION_GAS;

/// Where a transaction entered the pool from. Local transactions are
/// exempt from the price-bump replacement rule and from eviction under
/// memory pressure (§4.3 `add(tx, isLocal)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionOrigin {
    /// Submitted via the node's own RPC surface.
    Local,
    /// Received from a peer over the wire.
    External,
}

impl TransactionOrigin {
    /// Whether this origin is exempt from price-bump and eviction rules.
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// The operations the pool needs from a pooled transaction, independent
/// of the concrete envelope type.
pub trait PoolTransaction: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Wraps an already-recovered transaction, the inverse of
    /// [`PoolTransaction::to_consensus`]. Used to re-admit a transaction
    /// displaced by a reorg (§4.3, §8 property 7).
    fn from_consensus(transaction: TransactionSignedEcRecovered) -> Self;

    /// The transaction's hash.
    fn hash(&self) -> TxHash;

    /// The recovered sender.
    fn sender(&self) -> Address;

    /// The transaction's nonce.
    fn nonce(&self) -> u64;

    /// `value + max_fee_per_gas * gas_limit`, plus the max blob fee
    /// commitment for 4844 transactions: the balance a sender must hold
    /// for this transaction to remain executable (§4.3 "initial balance
    /// sufficiency").
    fn cost(&self) -> U256;

    /// The transaction's gas limit.
    fn gas_limit(&self) -> u64;

    /// `max_fee_per_gas`, or the flat gas price for a legacy transaction.
    fn max_fee_per_gas(&self) -> u128;

    /// `max_priority_fee_per_gas`, if the transaction is type 2 or later.
    fn max_priority_fee_per_gas(&self) -> Option<u128>;

    /// The priority fee this transaction would actually pay at `base_fee`,
    /// or `None` if `base_fee` exceeds its fee cap (ineligible at this
    /// base fee, per §4.3 "base-fee eligibility").
    fn effective_tip_per_gas(&self, base_fee: u64) -> Option<u128>;

    /// Whether this is a 1559-or-later (dynamic fee) transaction.
    fn is_dynamic_fee(&self) -> bool;

    /// The number of EIP-4844 blobs this transaction commits to.
    fn blob_count(&self) -> usize;

    /// The chain id the transaction was signed for, if it opted into
    /// replay protection.
    fn chain_id(&self) -> Option<u64>;

    /// RLP-encoded length, used for the pool's byte-size caps.
    fn encoded_length(&self) -> usize;

    /// The versioned hashes of this transaction's EIP-4844 blob
    /// commitments, empty for a non-blob transaction. Populates the
    /// pool's KZG/cell-proof indices (§3, §4.3 `add()`).
    fn blob_versioned_hashes(&self) -> Vec<B256>;

    /// Whether a blob-carrying transaction arrived together with its
    /// EIP-4844 sidecar (§4.3 "sidecar presence"). Always `true` for a
    /// transaction with no blobs.
    fn has_blob_sidecar(&self) -> bool;

    /// The transaction's intrinsic gas cost: the base cost plus calldata
    /// and access-list charges, computed before any EVM execution (§4.3
    /// `add()` "intrinsic gas").
    fn intrinsic_gas(&self) -> u64;

    /// The recovered, signed transaction this pool entry wraps, for
    /// callers (the block builder) that need to place it into a block
    /// body.
    fn to_consensus(&self) -> TransactionSignedEcRecovered;
}

/// The mainnet [`PoolTransaction`]: a recovered envelope plus its
/// precomputed cost, so `cost()` is O(1) on the hot insertion path
/// rather than recomputed per comparison.
#[derive(Debug, Clone)]
pub struct EthPooledTransaction {
    transaction: TransactionSignedEcRecovered,
    cost: U256,
    encoded_length: usize,
    has_blob_sidecar: bool,
}

impl EthPooledTransaction {
    /// Wraps a recovered transaction, precomputing its pool-relevant
    /// derived fields. A blob transaction built this way is assumed to
    /// carry its sidecar; use [`Self::without_blob_sidecar`] when that
    /// isn't true (e.g. a transaction recovered from a canonical block
    /// body, which never carries one).
    pub fn new(transaction: TransactionSignedEcRecovered) -> Self {
        let encoded_length = execution_primitives::transaction::size(transaction.transaction());
        let cost = Self::compute_cost(&transaction);
        Self { transaction, cost, encoded_length, has_blob_sidecar: true }
    }

    /// Marks this transaction as missing its EIP-4844 sidecar.
    pub fn without_blob_sidecar(mut self) -> Self {
        self.has_blob_sidecar = false;
        self
    }

    fn compute_cost(transaction: &TransactionSignedEcRecovered) -> U256 {
        let tx = transaction.transaction();
        let gas_cost = U256::from(tx.max_fee_per_gas()).saturating_mul(U256::from(tx.gas_limit()));
        let blob_cost = tx
            .max_fee_per_blob_gas()
            .map(|fee| {
                U256::from(fee).saturating_mul(U256::from(
                    tx.blob_versioned_hashes().map(<[_]>::len).unwrap_or(0)
                        * alloy_eips::eip4844::DATA_GAS_PER_BLOB as usize,
                ))
            })
            .unwrap_or_default();
        tx.value().saturating_add(gas_cost).saturating_add(blob_cost)
    }

    /// Borrows the underlying recovered transaction.
    pub const fn transaction(&self) -> &TransactionSignedEcRecovered {
        &self.transaction
    }

    /// Consumes the wrapper, returning the recovered transaction.
    pub fn into_transaction(self) -> TransactionSignedEcRecovered {
        self.transaction
    }
}

impl PoolTransaction for EthPooledTransaction {
    fn from_consensus(transaction: TransactionSignedEcRecovered) -> Self {
        // A block body carries no sidecar of its own, so a transaction
        // recovered from one (reorg re-injection, §4.3 property 7) can
        // only be re-pooled as missing its blob sidecar if it has one.
        let pooled = Self::new(transaction);
        if pooled.blob_count() > 0 {
            pooled.without_blob_sidecar()
        } else {
            pooled
        }
    }

    fn hash(&self) -> TxHash {
        self.transaction.hash()
    }

    fn sender(&self) -> Address {
        self.transaction.signer()
    }

    fn nonce(&self) -> u64 {
        self.transaction.transaction().nonce()
    }

    fn cost(&self) -> U256 {
        self.cost
    }

    fn gas_limit(&self) -> u64 {
        self.transaction.transaction().gas_limit()
    }

    fn max_fee_per_gas(&self) -> u128 {
        self.transaction.transaction().max_fee_per_gas()
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        self.transaction.transaction().max_priority_fee_per_gas()
    }

    fn effective_tip_per_gas(&self, base_fee: u64) -> Option<u128> {
        self.transaction.transaction().effective_tip_per_gas(base_fee)
    }

    fn is_dynamic_fee(&self) -> bool {
        self.transaction.transaction().max_priority_fee_per_gas().is_some()
    }

    fn blob_count(&self) -> usize {
        self.transaction.transaction().blob_versioned_hashes().map(<[_]>::len).unwrap_or(0)
    }

    fn chain_id(&self) -> Option<u64> {
        self.transaction.transaction().chain_id()
    }

    fn encoded_length(&self) -> usize {
        self.encoded_length
    }

    fn blob_versioned_hashes(&self) -> Vec<B256> {
        self.transaction.transaction().blob_versioned_hashes().map(<[_]>::to_vec).unwrap_or_default()
    }

    fn has_blob_sidecar(&self) -> bool {
        self.has_blob_sidecar
    }

    fn intrinsic_gas(&self) -> u64 {
        let tx = self.transaction.transaction();
        let mut gas = if tx.to().is_none() { 53_000 } else { MIN_TRANSACTION_GAS };

        for byte in tx.input().iter() {
            gas += if *byte == 0 { 4 } else { 16 };
        }

        if let Some(access_list) = tx.access_list() {
            for item in access_list.iter() {
                gas += 2_400;
                gas += item.storage_keys.len() as u64 * 1_900;
            }
        }

        gas
    }

    fn to_consensus(&self) -> TransactionSignedEcRecovered {
        self.transaction.clone()
    }
}
