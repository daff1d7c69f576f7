//! Transaction receipts.
//!
//! Built directly on [`alloy_consensus::Receipt`] rather than a
//! hand-rolled status/root union: `alloy_consensus::ReceiptEnvelope`
//! already encodes the pre-Byzantium post-state-root vs. post-Byzantium
//! status-byte distinction per transaction type.

use alloy_consensus::TxType;
use alloy_primitives::Bloom;

use crate::transaction::TransactionSigned;

/// A single transaction's receipt, together with its type-tagged bloom
/// filter, in the envelope that knows how to encode/decode itself per
/// transaction type.
pub type Receipt = alloy_consensus::ReceiptEnvelope;

/// A receipt paired with the bloom filter of its own logs.
pub type ReceiptWithBloom = alloy_consensus::ReceiptWithBloom<alloy_consensus::Receipt>;

/// All receipts produced by executing a block, in transaction order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Receipts(pub Vec<Receipt>);

impl Receipts {
    /// An empty receipt list.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// The combined logs bloom of every receipt.
    pub fn bloom(&self) -> Bloom {
        self.0.iter().fold(Bloom::ZERO, |acc, receipt| acc | *receipt_bloom(receipt))
    }
}

fn receipt_bloom(receipt: &Receipt) -> &Bloom {
    match receipt {
        Receipt::Legacy(r) | Receipt::Eip2930(r) | Receipt::Eip1559(r) | Receipt::Eip4844(r) => {
            &r.logs_bloom
        }
        Receipt::Eip7702(r) => &r.logs_bloom,
    }
}

/// Returns the type byte a receipt was produced for.
pub fn receipt_tx_type(receipt: &Receipt) -> TxType {
    receipt.tx_type()
}

/// Total gas spent by the first `num_txs` transactions in `transactions`,
/// used when validating a block's `gasUsed` header field against its
/// receipts (§3 block validity).
pub fn gas_spent_by_transactions(receipts: &Receipts) -> u64 {
    receipts
        .0
        .iter()
        .map(|r| match r {
            Receipt::Legacy(r) | Receipt::Eip2930(r) | Receipt::Eip1559(r) | Receipt::Eip4844(r) => {
                r.receipt.cumulative_gas_used
            }
            Receipt::Eip7702(r) => r.receipt.cumulative_gas_used,
        })
        .last()
        .unwrap_or(0)
}

/// Marker helper kept for symmetry with [`gas_spent_by_transactions`]:
/// returns the transactions a receipt list was produced for zipped
/// together, used by explorers/tests that want both side by side.
pub fn zip_with_transactions<'a>(
    receipts: &'a Receipts,
    transactions: &'a [TransactionSigned],
) -> impl Iterator<Item = (&'a Receipt, &'a TransactionSigned)> {
    receipts.0.iter().zip(transactions.iter())
}
